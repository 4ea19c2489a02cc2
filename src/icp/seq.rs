/*!
The depth-first branch-and-prune engine.

A LIFO stack of boxes drives the search.
Each popped box is pruned, evaluated, and either accepted, discarded, or split:

- pruned empty, the branch is done;
- every atom [True](Evaluation::True), the box is a δ-sat answer;
- some atom [False](Evaluation::False), the branch is refuted and the atom recorded as used;
- otherwise the box splits on a dimension chosen by the [brancher](super::brancher) over the active set, and both halves return to the stack.

A box whose active dimensions have all shrunk to the precision --- or which no longer has a splittable active dimension --- is likewise accepted: no undecided atom can be driven further on it.

When the stack empties without an accepted box the search is *unsat*, and the used constraints accumulated in the status form the refutation the caller turns into a blocking clause.
*/

use crate::contractor::status::ContractorStatus;
use crate::contractor::{Contractor, DynamicBitset};
use crate::context::Counters;
use crate::evaluator::{Evaluation, FormulaEvaluator};
use crate::interval::boxes::IntervalBox;
use crate::misc::interrupt;
use crate::misc::log::targets;
use crate::types::err::ErrorKind;

use super::brancher::{self, BranchStrategy};

/// The sequential engine: precision, branching strategy, and stack order.
pub struct IcpSeq {
    precision: f64,
    stack_left_first: bool,
    strategy: BranchStrategy,
}

/// What evaluating every atom against a box established.
enum BoxClass {
    /// Every atom δ-holds.
    DeltaSat,

    /// Some atom holds nowhere.
    Refuted,

    /// Undecided, with the active dimensions.
    Undecided(DynamicBitset),
}

impl IcpSeq {
    pub fn new(precision: f64, stack_left_first: bool, strategy: BranchStrategy) -> Self {
        IcpSeq {
            precision,
            stack_left_first,
            strategy,
        }
    }

    /// An engine with default branching, for inner searches.
    pub fn with_settings(precision: f64, stack_left_first: bool) -> Self {
        Self::new(precision, stack_left_first, BranchStrategy::LargestFirst)
    }

    /// Classifies the current box of `status`, recording a refuting atom as used.
    fn classify(
        &self,
        evaluators: &[FormulaEvaluator],
        status: &mut ContractorStatus,
        counters: &mut Counters,
    ) -> BoxClass {
        let _eval_timing = counters.eval_time.guard();

        let mut active = DynamicBitset::with_capacity(status.current().size());
        let mut all_true = true;

        for evaluator in evaluators {
            match evaluator.evaluate(status.current()) {
                Evaluation::True => {}

                Evaluation::False => {
                    log::trace!(target: targets::ICP, "{} refutes the box.", evaluator.literal());
                    status.add_used_constraint(evaluator.literal());
                    return BoxClass::Refuted;
                }

                Evaluation::Unknown => {
                    all_true = false;
                    evaluator.mark_dimensions(status.current(), &mut active);
                }
            }
        }

        if all_true {
            BoxClass::DeltaSat
        } else {
            BoxClass::Undecided(active)
        }
    }

    /// The maximum diameter over the active dimensions.
    fn max_active_diam(b: &IntervalBox, active: &DynamicBitset) -> f64 {
        let mut max_diam = 0.0_f64;
        for i in active.ones() {
            max_diam = max_diam.max(b.get(i).diam());
        }
        max_diam
    }

    /// Searches the current box of `status` for a δ-sat sub-box.
    ///
    /// Ok(Some(_)) is an accepted box, Ok(None) is *unsat*; the only error is
    /// an observed interrupt.
    pub fn check_sat(
        &self,
        contractor: &Contractor,
        evaluators: &[FormulaEvaluator],
        status: &mut ContractorStatus,
        counters: &mut Counters,
    ) -> Result<Option<IntervalBox>, ErrorKind> {
        let mut stack: Vec<IntervalBox> = vec![status.current().clone()];

        while let Some(popped) = stack.pop() {
            if interrupt::is_set() {
                log::debug!(target: targets::ICP, "Interrupt observed.");
                return Err(ErrorKind::Interrupted);
            }
            counters.icp_pops += 1;

            status.set_current(popped);

            {
                let before = status.current().interval_vector().to_vec();
                let _prune_timing = counters.prune_time.guard();
                contractor.prune(status)?;
                counters.prunes += 1;
                if status.current().interval_vector() == before.as_slice() {
                    counters.zero_effect_prunes += 1;
                }
            }

            if status.current().is_empty() {
                continue;
            }

            let active = match self.classify(evaluators, status, counters) {
                BoxClass::DeltaSat => {
                    log::debug!(target: targets::ICP, "δ-sat box accepted after {} pops.", counters.icp_pops);
                    return Ok(Some(status.current().clone()));
                }

                BoxClass::Refuted => continue,

                BoxClass::Undecided(active) => active,
            };

            if active.count_ones(..) == 0
                || Self::max_active_diam(status.current(), &active) <= self.precision
            {
                // Nothing undecided is wider than the precision; the box
                // cannot be driven further.
                return Ok(Some(status.current().clone()));
            }

            let Some(dim) = brancher::choose_dimension(&self.strategy, status.current(), &active)
            else {
                return Ok(Some(status.current().clone()));
            };

            let Some((left, right)) = status.current().bisect(dim) else {
                return Ok(Some(status.current().clone()));
            };
            counters.branches += 1;
            log::trace!(
                target: targets::ICP,
                "Branch on {} [{}].",
                status.current().variable(dim),
                status.current().get(dim)
            );

            // The half pushed last is explored first.
            if self.stack_left_first {
                stack.push(left);
                stack.push(right);
            } else {
                stack.push(right);
                stack.push(left);
            }
        }

        log::debug!(target: targets::ICP, "Stack exhausted; unsat with {} used constraints.", status.used_len());
        Ok(None)
    }
}

#[cfg(test)]
mod icp_seq_tests {
    use super::*;
    use crate::interval::Interval;
    use crate::symbolic::{Expression, Formula, Variable, VariableType};

    const DELTA: f64 = 0.001;

    fn solve(
        atoms: &[Formula],
        b: IntervalBox,
    ) -> (Option<IntervalBox>, ContractorStatus, Counters) {
        let children = atoms
            .iter()
            .filter_map(|a| Contractor::fwd_bwd(a, &b))
            .collect::<Vec<_>>();
        let contractor = Contractor::fixpoint(
            b.size(),
            crate::contractor::default_termination_condition(0.01),
            children,
        );
        let evaluators = atoms
            .iter()
            .map(|a| FormulaEvaluator::new(a, DELTA).expect("atom"))
            .collect::<Vec<_>>();

        let mut status = ContractorStatus::new(b);
        let mut counters = Counters::default();
        let icp = IcpSeq::with_settings(DELTA, false);

        let result = icp
            .check_sat(&contractor, &evaluators, &mut status, &mut counters)
            .expect("uninterrupted");
        (result, status, counters)
    }

    #[test]
    fn sqrt_two_is_delta_sat() {
        let x = Variable::fresh("x", VariableType::Real);
        let xe = Expression::from(&x);

        let atoms = [
            Formula::geq(xe.clone(), Expression::constant(-10.0)),
            Formula::leq(xe.clone(), Expression::constant(10.0)),
            Formula::eq(xe.clone() * xe, Expression::constant(2.0)),
        ];
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(-10.0, 10.0))]);

        let (result, _, _) = solve(&atoms, b);
        let witness = result.expect("δ-sat");

        let component = witness.get(0);
        let m = component.mid();
        assert!((m * m - 2.0).abs() <= 0.1);
    }

    #[test]
    fn out_of_range_bound_is_unsat_with_used_constraints() {
        let x = Variable::fresh("x", VariableType::Real);
        let xe = Expression::from(&x);

        let low = Formula::geq(xe.clone(), Expression::constant(0.0));
        let high = Formula::leq(xe.clone(), Expression::constant(1.0));
        let far = Formula::geq(xe, Expression::constant(2.0));
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(0.0, 1.0))]);

        let (result, status, _) = solve(&[low, high, far], b);

        assert!(result.is_none());
        assert!(!status.used_constraints().is_empty());
    }

    #[test]
    fn complex_root_is_unsat() {
        let x = Variable::fresh("x", VariableType::Real);
        let xe = Expression::from(&x);

        // x² + 1 = 0 over [-1, 1].
        let atoms = [
            Formula::geq(xe.clone(), Expression::constant(-1.0)),
            Formula::leq(xe.clone(), Expression::constant(1.0)),
            Formula::eq(
                xe.clone() * xe + Expression::constant(1.0),
                Expression::constant(0.0),
            ),
        ];
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(-1.0, 1.0))]);

        let (result, _, _) = solve(&atoms, b);
        assert!(result.is_none());
    }

}
