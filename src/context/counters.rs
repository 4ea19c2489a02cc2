//! Counts for various things which count, roughly.
//!
//! One instance is owned by the [context](crate::context::Context) and threaded
//! explicitly into the components that report --- nothing here is global, and a
//! solve interrupted half way leaves whatever was counted so far readable.

use crate::misc::timer::Timer;

/// Counters and timers for one context.
#[derive(Default)]
pub struct Counters {
    /// Boolean models requested from the backend.
    pub check_sat_calls: usize,

    /// Blocking clauses learned from theory refutations.
    pub blocking_clauses: usize,

    /// Boxes popped (or selected) by an icp engine.
    pub icp_pops: usize,

    /// Bisections performed.
    pub branches: usize,

    /// Top-level contractor applications.
    pub prunes: usize,

    /// Contractor applications which narrowed nothing.
    pub zero_effect_prunes: usize,

    /// Monte-Carlo iterations driven.
    pub mcts_iterations: usize,

    /// Monte-Carlo simulations run.
    pub mcts_simulations: usize,

    /// Time spent inside the boolean backend.
    pub sat_time: Timer,

    /// Time spent pruning.
    pub prune_time: Timer,

    /// Time spent evaluating atoms.
    pub eval_time: Timer,
}

impl std::fmt::Display for Counters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "check-sat calls      {:>12}", self.check_sat_calls)?;
        writeln!(f, "blocking clauses     {:>12}", self.blocking_clauses)?;
        writeln!(f, "boxes examined       {:>12}", self.icp_pops)?;
        writeln!(f, "branches             {:>12}", self.branches)?;
        writeln!(
            f,
            "prunes               {:>12} ({} zero-effect)",
            self.prunes, self.zero_effect_prunes
        )?;
        writeln!(f, "mcts iterations      {:>12}", self.mcts_iterations)?;
        writeln!(f, "mcts simulations     {:>12}", self.mcts_simulations)?;
        writeln!(f, "sat time             {:>12.6}s", self.sat_time.seconds())?;
        writeln!(f, "prune time           {:>12.6}s", self.prune_time.seconds())?;
        write!(f, "eval time            {:>12.6}s", self.eval_time.seconds())
    }
}
