/*!
Configuration of a context.

All configuration for a context is contained within the context.
The configuration is read at the start of a solve; changing it between solves is fine, changing it during one is not possible.

Validation happens on entry to a solve, so an impossible request --- a negative δ, more than one job --- surfaces as an [error](crate::types::err::ConfigError) rather than as quiet misbehaviour.
*/

mod phase;
pub use phase::SatDefaultPhase;

mod brancher;
pub use brancher::BrancherKind;

use std::collections::HashSet;

use crate::types::err::{ConfigError, ErrorKind};

/// The primary configuration structure.
#[derive(Clone)]
pub struct Config {
    /// The precision δ of a solve.
    ///
    /// Every atom of a δ-sat answer holds on the returned box after weakening by δ.
    pub precision: f64,

    /// Reserved for parallel search; must be 1.
    pub number_of_jobs: usize,

    /// Seed for every random choice of a solve. 0 selects the default stream.
    pub random_seed: u64,

    /// The polarity the boolean backend assigns when it is free to choose.
    pub sat_default_phase: SatDefaultPhase,

    /// Tighten the linear subset of the asserted atoms jointly.
    pub use_polytope: bool,

    /// As [use_polytope](Config::use_polytope), inside quantified searches.
    pub use_polytope_in_forall: bool,

    /// Schedule pruning by the input/output bits rather than by sweeps.
    pub use_worklist_fixpoint: bool,

    /// Reserved for a local-optimization refinement pass; accepted and unused.
    pub use_local_optimization: bool,

    /// Explore the left half of a bisection after the right half.
    pub stack_left_box_first: bool,

    /// How the icp engines choose a dimension to bisect.
    pub brancher: BrancherKind,

    /// Variables bisected ahead of the rest under [BrancherKind::PreferredFirst].
    pub preferred_variables: HashSet<String>,

    /// The width below which a preferred variable counts as converged.
    pub preferred_precision: f64,

    /// Drive the theory search by Monte-Carlo tree search.
    pub use_mcts: bool,

    /// The Monte-Carlo iteration budget.
    pub mcts_iterations: usize,

    /// Track clause ancestry in the backend and lift an unsat core.
    pub unsat_core: bool,
}

impl Default for Config {
    /// Quick deterministic solves: δ of 10⁻³, sequential search, largest-first branching.
    fn default() -> Self {
        Config {
            precision: 0.001,
            number_of_jobs: 1,
            random_seed: 0,
            sat_default_phase: SatDefaultPhase::JeroslowWang,
            use_polytope: false,
            use_polytope_in_forall: false,
            use_worklist_fixpoint: false,
            use_local_optimization: false,
            stack_left_box_first: false,
            brancher: BrancherKind::LargestFirst,
            preferred_variables: HashSet::default(),
            preferred_precision: 0.001,
            use_mcts: false,
            mcts_iterations: 1000,
            unsat_core: false,
        }
    }
}

impl Config {
    /// Checks the configuration is one a solve can honour.
    pub fn validate(&self) -> Result<(), ErrorKind> {
        if !(self.precision.is_finite() && self.precision > 0.0) {
            return Err(ConfigError::NonPositivePrecision.into());
        }
        if self.number_of_jobs != 1 {
            return Err(ConfigError::NumberOfJobs.into());
        }
        if self.use_mcts && self.mcts_iterations == 0 {
            return Err(ConfigError::MctsIterations.into());
        }
        if !(self.preferred_precision.is_finite() && self.preferred_precision >= 0.0) {
            return Err(ConfigError::PreferredPrecision.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn impossible_requests_are_rejected() {
        let mut negative_delta = Config::default();
        negative_delta.precision = -1.0;
        assert_eq!(
            negative_delta.validate(),
            Err(ConfigError::NonPositivePrecision.into())
        );

        let mut parallel = Config::default();
        parallel.number_of_jobs = 4;
        assert_eq!(parallel.validate(), Err(ConfigError::NumberOfJobs.into()));
    }
}
