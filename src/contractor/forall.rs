/*!
Counterexample-guided pruning of a universally quantified atom.

A round of pruning runs a small inner search for a *counterexample* to the body: a point of the quantified domain, paired with a region of the outer box, on which the negated body is δ-satisfiable.
When one is found the body is instantiated at the counterexample's midpoint and the instantiation --- now a quantifier-free constraint over the outer variables alone --- prunes the outer box.

Any point of the outer box satisfying the universal satisfies every instance of the body, so pruning with an instance never removes such a point: the soundness law is inherited from the instance's contractors.

Rounds continue until the inner search finds no counterexample, a round stops narrowing, or the round budget is spent.
The kind is marked [include_forall](crate::contractor::Contractor::include_forall), and the outer layer budgets it accordingly --- in particular the Monte-Carlo simulation contractor omits it.
*/

use std::collections::HashMap;

use crate::context::Counters;
use crate::evaluator::{check_quantified_body, FormulaEvaluator};
use crate::icp::seq::IcpSeq;
use crate::interval::boxes::IntervalBox;
use crate::misc::interrupt;
use crate::misc::log::targets;
use crate::symbolic::{Expression, Formula, FormulaNode, QuantifiedBound, Variable};
use crate::types::err::{ErrorKind, UnsupportedError};

use super::status::ContractorStatus;
use super::Contractor;

/// How many counterexample rounds a single prune may spend.
const DEFAULT_ROUNDS: usize = 8;

/// A universally quantified atom, pruned by instantiation.
pub struct ForallContractor {
    /// The quantified atom as asserted, recorded when a round narrows the box.
    literal: Formula,

    bounds: Vec<QuantifiedBound>,
    body: Formula,

    free_variables: Vec<Variable>,

    delta: f64,
    rounds: usize,

    /// Include the joint linear contractor in the inner search.
    use_polytope: bool,
}

impl ForallContractor {
    /// Prepares a quantified atom for pruning.
    pub fn new(literal: &Formula, delta: f64, use_polytope: bool) -> Result<Self, ErrorKind> {
        let FormulaNode::Forall(bounds, body) = literal.node() else {
            return Err(UnsupportedError::NonArithmeticLiteral.into());
        };
        check_quantified_body(body)?;

        Ok(ForallContractor {
            literal: literal.clone(),
            bounds: bounds.clone(),
            body: body.clone(),
            free_variables: literal.free_variables().into_iter().collect(),
            delta,
            rounds: DEFAULT_ROUNDS,
            use_polytope,
        })
    }

    pub fn free_variables(&self) -> &[Variable] {
        &self.free_variables
    }

    pub fn prune(&self, status: &mut ContractorStatus) -> Result<(), ErrorKind> {
        for round in 0..self.rounds {
            if interrupt::is_set() {
                return Err(ErrorKind::Interrupted);
            }

            let Some(witness) = self.find_counterexample(status.current())? else {
                log::trace!(target: targets::PRUNE, "{}: no counterexample (round {round}).", self.literal);
                return Ok(());
            };

            let mut instantiation = HashMap::new();
            for bound in &self.bounds {
                let domain = witness
                    .interval_of(&bound.variable)
                    .unwrap_or(bound.domain);
                instantiation.insert(
                    bound.variable.clone(),
                    Expression::constant(domain.mid()),
                );
            }
            let instance = self.body.substitute(&instantiation).nnf();

            let width = status.current().size();
            let Some(instance_contractor) =
                Contractor::for_quantifier_free(&instance, status.current(), width)
            else {
                return Ok(());
            };

            let before = status.current().interval_vector().to_vec();
            let used_mark = status.used_len();

            instance_contractor.prune(status)?;

            // The instance's atoms are not atoms of the outer problem; the
            // quantified atom itself is what the refutation used.
            status.truncate_used(used_mark);

            let changed = status
                .current()
                .interval_vector()
                .iter()
                .zip(before.iter())
                .any(|(new, old)| new != old);

            if changed {
                status.add_used_constraint(&self.literal);
            }
            if status.current().is_empty() {
                return Ok(());
            }
            if !changed {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Searches for an instance of the quantified variables on which the
    /// negated body is δ-satisfiable somewhere over the outer box.
    fn find_counterexample(&self, outer: &IntervalBox) -> Result<Option<IntervalBox>, ErrorKind> {
        let mut components = Vec::with_capacity(outer.size() + self.bounds.len());
        for i in 0..outer.size() {
            components.push((outer.variable(i).clone(), outer.get(i)));
        }
        for bound in &self.bounds {
            components.push((bound.variable.clone(), bound.domain));
        }
        let inner_box = IntervalBox::new(components);

        let negation = self.body.negate().nnf();
        let width = inner_box.size();

        let mut children = Vec::new();
        if let Some(main) = Contractor::for_quantifier_free(&negation, &inner_box, width) {
            children.push(main);
        }
        if self.use_polytope {
            if let FormulaNode::And(conjuncts) = negation.node() {
                if let Some(linear) = Contractor::polytope(conjuncts, &inner_box) {
                    children.push(linear);
                }
            }
        }
        if children.is_empty() {
            // Nothing can prune the negation; treat the whole domain as a
            // counterexample candidate.
            return Ok(Some(inner_box));
        }
        let contractor = Contractor::seq(width, children);

        let evaluator = FormulaEvaluator::general(&negation, self.delta);

        let icp = IcpSeq::with_settings(self.delta, true);
        let mut inner_status = ContractorStatus::new(inner_box);
        let mut scratch = Counters::default();

        icp.check_sat(
            &contractor,
            std::slice::from_ref(&evaluator),
            &mut inner_status,
            &mut scratch,
        )
    }
}
