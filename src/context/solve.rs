/*!
The outer solve loop and the minimization driver.

[solve_asserted](Context::solve_asserted) is the CDCL(T) alternation described on the [context](crate::context): boolean models out, blocking clauses in, until a δ-sat box or a boolean refutation.

[minimize_asserted](Context::minimize_asserted) wraps it in a binary search.
A fresh upper-bound variable u is constrained above the objective, and each probe asserts `u ≤ trial` in its own incremental frame: a feasible probe records its witness and tightens the bracket to the midpoint of the objective over that witness, an infeasible probe raises the floor.
The search stops when the bracket is within δ.
*/

use crate::contractor::status::ContractorStatus;
use crate::contractor::{default_termination_condition, Contractor, ForallContractor};
use crate::evaluator::{expression_range, FormulaEvaluator};
use crate::icp::brancher::BranchStrategy;
use crate::icp::mcts::IcpMcts;
use crate::icp::seq::IcpSeq;
use crate::interval::boxes::IntervalBox;
use crate::interval::Interval;
use crate::misc::log::targets;
use crate::symbolic::{Expression, Formula, FormulaNode, Variable, VariableType};
use crate::types::err::ErrorKind;

use super::Context;

/// Relative narrowing below which a fixpoint sweep is not worth repeating.
const FIXPOINT_TAU: f64 = 0.01;

/// Doublings allowed while bracketing the objective from below.
const BRACKET_DOUBLINGS: usize = 64;

impl Context {
    fn branch_strategy(&self) -> BranchStrategy {
        match self.config.brancher {
            crate::config::BrancherKind::LargestFirst => BranchStrategy::LargestFirst,
            crate::config::BrancherKind::PreferredFirst => BranchStrategy::PreferredFirst {
                preferred: self.config.preferred_variables.clone(),
                threshold: self.config.preferred_precision,
            },
        }
    }

    /// The top-level contractor for one set of asserted literals: a fixpoint
    /// over the forward/backward leaves plus the configured refinements.
    fn build_contractor(
        &self,
        literals: &[Formula],
        b: &IntervalBox,
    ) -> Result<Contractor, ErrorKind> {
        let width = b.size();
        let mut leaves = Vec::with_capacity(literals.len() + 2);

        for literal in literals {
            if let FormulaNode::Forall(..) = literal.node() {
                let inner = ForallContractor::new(
                    literal,
                    self.config.precision,
                    self.config.use_polytope_in_forall,
                )?;
                leaves.push(Contractor::forall(inner, b));
                continue;
            }
            if let Some(leaf) = Contractor::fwd_bwd(literal, b) {
                leaves.push(leaf);
            }
        }

        if self.config.use_polytope {
            if let Some(linear) = Contractor::polytope(literals, b) {
                leaves.push(linear);
            }
        }
        if let Some(integral) = Contractor::integer_bounds(b) {
            leaves.push(integral);
        }

        if leaves.is_empty() {
            return Ok(Contractor::id(width));
        }

        let condition = default_termination_condition(FIXPOINT_TAU);
        Ok(match self.config.use_worklist_fixpoint {
            true => Contractor::worklist_fixpoint(width, condition, leaves),
            false => Contractor::fixpoint(width, condition, leaves),
        })
    }

    /// The CDCL(T) loop over everything currently asserted.
    pub(super) fn solve_asserted(&mut self) -> Result<Option<IntervalBox>, ErrorKind> {
        let delta = self.config.precision;
        let initial_box = self.initial_box();

        'theory_loop: loop {
            let Some(model) = self.bridge.check_sat(&mut self.counters)? else {
                log::info!(target: targets::CONTEXT, "Boolean layer exhausted: unsat.");
                return Ok(None);
            };

            if model.theory_literals.is_empty() {
                // Nothing for the theory layer to refute.
                return Ok(Some(initial_box));
            }

            let literals = model
                .theory_literals
                .iter()
                .map(|(atom, polarity)| match polarity {
                    true => atom.clone(),
                    false => atom.negate(),
                })
                .collect::<Vec<_>>();

            let mut evaluators = Vec::with_capacity(literals.len());
            for literal in &literals {
                evaluators.push(FormulaEvaluator::new(literal, delta)?);
            }

            let contractor = self.build_contractor(&literals, &initial_box)?;
            let mut status = ContractorStatus::new(initial_box.clone());

            let result = match self.config.use_mcts {
                false => {
                    let engine = IcpSeq::new(
                        delta,
                        self.config.stack_left_box_first,
                        self.branch_strategy(),
                    );
                    engine.check_sat(&contractor, &evaluators, &mut status, &mut self.counters)?
                }
                true => {
                    let engine = IcpMcts::new(
                        delta,
                        self.config.stack_left_box_first,
                        self.branch_strategy(),
                        self.config.mcts_iterations,
                    );
                    engine.check_sat(
                        &contractor,
                        &evaluators,
                        &mut status,
                        &mut self.counters,
                        &mut self.rng,
                    )?
                }
            };

            match result {
                Some(delta_sat_box) => {
                    log::info!(target: targets::CONTEXT, "δ-sat.");
                    return Ok(Some(delta_sat_box));
                }

                None => {
                    // Teach the boolean layer which atoms refuted this assignment.
                    let used = status.used_constraints();
                    let blocking = match used.is_empty() {
                        // Nothing specific was used; exclude the assignment whole.
                        true => literals.as_slice(),
                        false => used,
                    };
                    self.bridge.add_learned_clause(blocking)?;
                    self.counters.blocking_clauses += 1;
                    log::debug!(
                        target: targets::CONTEXT,
                        "Blocking clause {} over {} atoms.",
                        self.counters.blocking_clauses,
                        blocking.len()
                    );
                    continue 'theory_loop;
                }
            }
        }
    }

    /// One feasibility probe with `bound` asserted in its own frame.
    fn probe(
        &mut self,
        bound: &Formula,
    ) -> Result<Option<IntervalBox>, ErrorKind> {
        self.bridge.push();
        let result = match self.assert_probe(bound) {
            Ok(()) => self.solve_asserted(),
            Err(e) => Err(e),
        };
        self.bridge.pop();
        result
    }

    fn assert_probe(&mut self, bound: &Formula) -> Result<(), ErrorKind> {
        self.bridge.add_formula(bound)
    }

    /// Binary search on a fresh upper bound of the objective.
    pub(super) fn minimize_asserted(
        &mut self,
        objective: &Expression,
        constraint: &Formula,
    ) -> Result<Option<IntervalBox>, ErrorKind> {
        let delta = self.config.precision;

        let upper_bound = Variable::fresh("ub", VariableType::Real);
        let bounded = Formula::and(vec![
            constraint.clone(),
            Formula::leq(objective.clone(), Expression::from(&upper_bound)),
        ]);

        self.assert_formula(&bounded)?;
        let Some(first_witness) = self.solve_asserted()? else {
            log::info!(target: targets::CONTEXT, "Minimize: constraint infeasible.");
            return Ok(None);
        };

        let objective_on = |witness: &IntervalBox| -> Interval {
            expression_range(objective, &|v: &Variable| {
                witness.interval_of(v).unwrap_or(Interval::ENTIRE)
            })
        };

        let mut best = first_witness;
        let mut high = {
            let range = objective_on(&best);
            if range.hi().is_finite() {
                range.hi()
            } else {
                range.mid()
            }
        };

        // Bracket from below: double the probe distance until infeasible.
        let mut low = f64::NEG_INFINITY;
        let mut step = delta.max(1.0);
        for _ in 0..BRACKET_DOUBLINGS {
            let trial = high - step;
            let bound = Formula::leq(Expression::from(&upper_bound), Expression::constant(trial));
            match self.probe(&bound)? {
                Some(witness) => {
                    high = objective_on(&witness).mid().min(trial);
                    best = witness;
                }
                None => {
                    low = trial;
                    break;
                }
            }
            step *= 2.0;
        }
        if low == f64::NEG_INFINITY {
            // The objective kept improving; report the best found.
            log::info!(target: targets::CONTEXT, "Minimize: bracket never closed, returning the best witness.");
            return Ok(Some(best));
        }

        while high - low > delta {
            let trial = 0.5 * low + 0.5 * high;
            let bound = Formula::leq(Expression::from(&upper_bound), Expression::constant(trial));
            match self.probe(&bound)? {
                Some(witness) => {
                    high = objective_on(&witness).mid().min(trial);
                    best = witness;
                }
                None => {
                    low = trial;
                }
            }
            log::trace!(target: targets::CONTEXT, "Minimize bracket [{low}, {high}].");
        }

        Ok(Some(best))
    }
}
