/*!
The contractor algebra --- composable box-pruning operators.

A [Contractor] maps a box to a sub-box without removing any point satisfying its associated constraint.
Two laws hold for every kind, and the composite kinds preserve them:

- *Contraction*: the output box is contained in the input box.
- *Soundness*: no satisfying point of the represented constraint is removed.

Contractors are immutable after construction and freely shareable; a handle is a reference-counted cell with a kind tag, and [prune](Contractor::prune) is the single dispatch site.

# The input/output protocol

Every contractor declares an *input* bitset: the box dimensions it reads.
Every prune records the dimensions it changed in the *output* bitset of the threaded [status](status::ContractorStatus).
The [WorklistFixpoint](ContractorKind::WorklistFixpoint) kind joins the two halves, re-scheduling a child only when some previously executed child narrowed a dimension the first one reads.

# Interruption

The fixpoint kinds poll the process-wide [interrupt flag](crate::misc::interrupt) once per iteration and unwind with [Interrupted](crate::types::err::ErrorKind::Interrupted) when it is set.
No other kind can run unboundedly, and none polls.
*/

pub mod fwdbwd;
pub mod polytope;
pub mod status;

mod forall;
pub use forall::ForallContractor;

use std::rc::Rc;

use crate::interval::boxes::IntervalBox;
use crate::interval::Interval;
use crate::misc::interrupt;
use crate::misc::log::targets;
use crate::symbolic::{Formula, FormulaNode, VariableType};
use crate::types::err::ErrorKind;

use fwdbwd::FwdBwd;
use polytope::Polytope;
use status::ContractorStatus;

/// The bitset tracking box dimensions, in input and output roles.
pub type DynamicBitset = fixedbitset::FixedBitSet;

/// Decides whether a fixpoint iteration should stop, given the interval
/// vectors before and after a full sweep.
pub type TerminationCondition = Rc<dyn Fn(&[Interval], &[Interval]) -> bool>;

/// The canonical termination condition: stop once no component's diameter
/// shrank by more than the fraction `tau` of its previous diameter.
pub fn default_termination_condition(tau: f64) -> TerminationCondition {
    Rc::new(move |old: &[Interval], new: &[Interval]| {
        for (o, n) in old.iter().zip(new.iter()) {
            let old_diam = o.diam();
            let new_diam = n.diam();
            if old_diam.is_infinite() {
                if new_diam.is_finite() {
                    return false;
                }
                continue;
            }
            if old_diam > 0.0 && (old_diam - new_diam) / old_diam > tau {
                return false;
            }
        }
        true
    })
}

/// The kinds of contractor.
pub enum ContractorKind {
    /// The identity: no pruning.
    Id,

    /// One atom, pruned by a forward/backward pass.
    FwdBwd(FwdBwd),

    /// The linear subset of the asserted atoms, tightened jointly.
    Polytope(Polytope),

    /// Children applied in declaration order, short-circuiting on an empty box.
    Seq(Vec<Contractor>),

    /// Children swept repeatedly until the termination condition holds.
    Fixpoint(TerminationCondition, Vec<Contractor>),

    /// Children applied to copies of the box; the result is the hull of the survivors.
    Join(Vec<Contractor>),

    /// Integral dimensions tightened to integral bounds.
    IntegerBounds(Vec<usize>),

    /// A universally quantified subformula, pruned by counterexample-guided instantiation.
    Forall(ForallContractor),

    /// Fixpoint semantics with output-driven scheduling.
    WorklistFixpoint(TerminationCondition, Vec<Contractor>),
}

struct ContractorCell {
    input: DynamicBitset,
    include_forall: bool,
    kind: ContractorKind,
}

/// A shareable box-pruning operator.
#[derive(Clone)]
pub struct Contractor {
    cell: Rc<ContractorCell>,
}

/// The union of the children's inputs, and the disjunction of their forall markers.
fn combined_header(width: usize, children: &[Contractor]) -> (DynamicBitset, bool) {
    let mut input = DynamicBitset::with_capacity(width);
    let mut include_forall = false;
    for child in children {
        input.union_with(child.input());
        include_forall |= child.include_forall();
    }
    (input, include_forall)
}

impl Contractor {
    fn from_parts(input: DynamicBitset, include_forall: bool, kind: ContractorKind) -> Self {
        Contractor {
            cell: Rc::new(ContractorCell {
                input,
                include_forall,
                kind,
            }),
        }
    }

    /// The identity contractor over a box of dimension `width`.
    pub fn id(width: usize) -> Self {
        Self::from_parts(
            DynamicBitset::with_capacity(width),
            false,
            ContractorKind::Id,
        )
    }

    /// A forward/backward contractor for one asserted literal.
    ///
    /// None when the literal has no usable interval form; the caller elides it.
    pub fn fwd_bwd(literal: &Formula, b: &IntervalBox) -> Option<Self> {
        let inner = FwdBwd::try_new(literal)?;
        let mut input = DynamicBitset::with_capacity(b.size());
        for variable in inner.variables() {
            let i = b.index(&variable)?;
            input.insert(i);
        }
        Some(Self::from_parts(input, false, ContractorKind::FwdBwd(inner)))
    }

    /// A joint linear-relaxation contractor over the asserted literals.
    ///
    /// None when no literal is linear.
    pub fn polytope(literals: &[Formula], b: &IntervalBox) -> Option<Self> {
        let inner = Polytope::try_new(literals, b)?;
        let mut input = DynamicBitset::with_capacity(b.size());
        for i in inner.dimensions() {
            input.insert(i);
        }
        Some(Self::from_parts(
            input,
            false,
            ContractorKind::Polytope(inner),
        ))
    }

    pub fn seq(width: usize, children: Vec<Contractor>) -> Self {
        let (input, include_forall) = combined_header(width, &children);
        Self::from_parts(input, include_forall, ContractorKind::Seq(children))
    }

    pub fn fixpoint(
        width: usize,
        condition: TerminationCondition,
        children: Vec<Contractor>,
    ) -> Self {
        let (input, include_forall) = combined_header(width, &children);
        Self::from_parts(
            input,
            include_forall,
            ContractorKind::Fixpoint(condition, children),
        )
    }

    pub fn worklist_fixpoint(
        width: usize,
        condition: TerminationCondition,
        children: Vec<Contractor>,
    ) -> Self {
        let (input, include_forall) = combined_header(width, &children);
        Self::from_parts(
            input,
            include_forall,
            ContractorKind::WorklistFixpoint(condition, children),
        )
    }

    pub fn join(width: usize, children: Vec<Contractor>) -> Self {
        let (input, include_forall) = combined_header(width, &children);
        Self::from_parts(input, include_forall, ContractorKind::Join(children))
    }

    /// Tightens every integer-typed dimension of `b` to integral bounds.
    ///
    /// None when the box has no integer dimension.
    pub fn integer_bounds(b: &IntervalBox) -> Option<Self> {
        let mut dimensions = Vec::new();
        for (i, variable) in b.variables().iter().enumerate() {
            if variable.variable_type() == VariableType::Integer {
                dimensions.push(i);
            }
        }
        if dimensions.is_empty() {
            return None;
        }
        let mut input = DynamicBitset::with_capacity(b.size());
        for &i in &dimensions {
            input.insert(i);
        }
        Some(Self::from_parts(
            input,
            false,
            ContractorKind::IntegerBounds(dimensions),
        ))
    }

    /// A counterexample-guided contractor for a universally quantified atom.
    pub fn forall(inner: ForallContractor, b: &IntervalBox) -> Self {
        let mut input = DynamicBitset::with_capacity(b.size());
        for variable in inner.free_variables() {
            if let Some(i) = b.index(variable) {
                input.insert(i);
            }
        }
        Self::from_parts(input, true, ContractorKind::Forall(inner))
    }

    /// A contractor for a quantifier-free formula: conjunctions sequence,
    /// disjunctions join, atoms prune forward/backward.
    ///
    /// None when nothing in the formula can prune.
    pub fn for_quantifier_free(formula: &Formula, b: &IntervalBox, width: usize) -> Option<Self> {
        match formula.node() {
            FormulaNode::Relation(..) => Self::fwd_bwd(formula, b),

            FormulaNode::Not(inner) => match inner.node() {
                FormulaNode::Relation(..) => Self::fwd_bwd(formula, b),
                _ => None,
            },

            FormulaNode::And(fs) => {
                let children = fs
                    .iter()
                    .filter_map(|f| Self::for_quantifier_free(f, b, width))
                    .collect::<Vec<_>>();
                match children.len() {
                    0 => None,
                    1 => Some(children.into_iter().next().unwrap()),
                    _ => Some(Self::seq(width, children)),
                }
            }

            FormulaNode::Or(fs) => {
                // A disjunct with no contractor can keep any point, so the join
                // must carry an identity child for it.
                let mut children = Vec::with_capacity(fs.len());
                for f in fs {
                    match Self::for_quantifier_free(f, b, width) {
                        Some(c) => children.push(c),
                        None => children.push(Self::id(width)),
                    }
                }
                Some(Self::join(width, children))
            }

            _ => None,
        }
    }

    /// The box dimensions the contractor reads.
    pub fn input(&self) -> &DynamicBitset {
        &self.cell.input
    }

    /// True when a quantified contractor is somewhere within.
    pub fn include_forall(&self) -> bool {
        self.cell.include_forall
    }

    pub fn kind(&self) -> &ContractorKind {
        &self.cell.kind
    }

    /// Prunes the box in `status`.
    ///
    /// Fails only on interruption; an emptied box is an answer, not an error.
    pub fn prune(&self, status: &mut ContractorStatus) -> Result<(), ErrorKind> {
        match &self.cell.kind {
            ContractorKind::Id => Ok(()),

            ContractorKind::FwdBwd(inner) => {
                inner.prune(status);
                Ok(())
            }

            ContractorKind::Polytope(inner) => {
                inner.prune(status);
                Ok(())
            }

            ContractorKind::Seq(children) => {
                for child in children {
                    child.prune(status)?;
                    if status.current().is_empty() {
                        return Ok(());
                    }
                }
                Ok(())
            }

            ContractorKind::Fixpoint(condition, children) => {
                loop {
                    if interrupt::is_set() {
                        log::debug!(target: targets::FIXPOINT, "Interrupt observed.");
                        return Err(ErrorKind::Interrupted);
                    }

                    let old = status.current().interval_vector().to_vec();

                    for child in children {
                        child.prune(status)?;
                        if status.current().is_empty() {
                            return Ok(());
                        }
                    }

                    if condition.as_ref()(&old, status.current().interval_vector()) {
                        return Ok(());
                    }
                }
            }

            ContractorKind::WorklistFixpoint(condition, children) => {
                prune_worklist(condition, children, status)
            }

            ContractorKind::Join(children) => prune_join(children, status),

            ContractorKind::IntegerBounds(dimensions) => {
                for &i in dimensions {
                    let component = status.current().get(i);
                    if component.is_empty() {
                        continue;
                    }
                    let tightened =
                        Interval::new(component.lo().ceil(), component.hi().floor());
                    if tightened != component {
                        if tightened.is_empty() {
                            status.current_mut().set_empty();
                            status.mark_all_output();
                            return Ok(());
                        }
                        status.current_mut().set(i, tightened);
                        status.mark_output(i);
                    }
                }
                Ok(())
            }

            ContractorKind::Forall(inner) => inner.prune(status),
        }
    }

    /// A cheaper variant for simulation: the same structure with quantified and
    /// polytope children omitted.
    ///
    /// Dropping a sound contractor is sound; what remains only prunes less.
    /// None when nothing remains.
    pub fn heuristic_subset(&self) -> Option<Contractor> {
        let width = self.cell.input.len();
        match &self.cell.kind {
            ContractorKind::Polytope(_) | ContractorKind::Forall(_) => None,

            ContractorKind::Id
            | ContractorKind::FwdBwd(_)
            | ContractorKind::IntegerBounds(_) => Some(self.clone()),

            ContractorKind::Seq(children) => {
                let kept = children
                    .iter()
                    .filter_map(Contractor::heuristic_subset)
                    .collect::<Vec<_>>();
                match kept.is_empty() {
                    true => None,
                    false => Some(Self::seq(width, kept)),
                }
            }

            ContractorKind::Fixpoint(condition, children) => {
                let kept = children
                    .iter()
                    .filter_map(Contractor::heuristic_subset)
                    .collect::<Vec<_>>();
                match kept.is_empty() {
                    true => None,
                    false => Some(Self::fixpoint(width, condition.clone(), kept)),
                }
            }

            ContractorKind::WorklistFixpoint(condition, children) => {
                let kept = children
                    .iter()
                    .filter_map(Contractor::heuristic_subset)
                    .collect::<Vec<_>>();
                match kept.is_empty() {
                    true => None,
                    false => Some(Self::worklist_fixpoint(width, condition.clone(), kept)),
                }
            }

            ContractorKind::Join(children) => {
                // A join child without a subset keeps its whole copy, as the
                // identity does.
                let kept = children
                    .iter()
                    .map(|c| c.heuristic_subset().unwrap_or_else(|| Self::id(width)))
                    .collect::<Vec<_>>();
                Some(Self::join(width, kept))
            }
        }
    }
}

/// Fixpoint pruning with output-driven scheduling.
///
/// Children start queued in declaration order, and a child is re-queued when a
/// later narrowing touches its input set.
/// The queue is drained fairly: every scheduled child runs before the
/// termination condition can end the pass.
fn prune_worklist(
    condition: &TerminationCondition,
    children: &[Contractor],
    status: &mut ContractorStatus,
) -> Result<(), ErrorKind> {
    use std::collections::VecDeque;

    let mut queue: VecDeque<usize> = (0..children.len()).collect();
    let mut queued = vec![true; children.len()];

    let mut sweep_mark = status.current().interval_vector().to_vec();
    let mut processed_this_sweep = 0;

    while let Some(i) = queue.pop_front() {
        if interrupt::is_set() {
            log::debug!(target: targets::FIXPOINT, "Interrupt observed (worklist).");
            return Err(ErrorKind::Interrupted);
        }
        queued[i] = false;

        let before = status.output().clone();
        children[i].prune(status)?;
        if status.current().is_empty() {
            return Ok(());
        }

        // The dimensions this child just narrowed.
        let mut fresh = status.output().clone();
        fresh.difference_with(&before);

        if fresh.count_ones(..) > 0 {
            for (j, child) in children.iter().enumerate() {
                if !queued[j] && !fresh.is_disjoint(child.input()) {
                    queue.push_back(j);
                    queued[j] = true;
                }
            }
        }

        processed_this_sweep += 1;
        if processed_this_sweep >= children.len() {
            processed_this_sweep = 0;
            let now = status.current().interval_vector().to_vec();
            if condition.as_ref()(&sweep_mark, &now) {
                return Ok(());
            }
            sweep_mark = now;
        }
    }

    Ok(())
}

/// Applies each child to a copy of the box; the result is the hull of the
/// non-empty results, empty iff every child empties its copy.
fn prune_join(children: &[Contractor], status: &mut ContractorStatus) -> Result<(), ErrorKind> {
    let input_box = status.current().clone();
    let saved_output = status.take_output();

    let mut hull: Option<IntervalBox> = None;

    for child in children {
        status.set_current(input_box.clone());
        child.prune(status)?;

        if !status.current().is_empty() {
            match hull.as_mut() {
                Some(h) => h.hull_assign(status.current()),
                None => hull = Some(status.current().clone()),
            }
        }
    }

    // Output bits from the children describe their private copies; replace
    // them with the dimensions the hull actually changed.
    status.take_output();
    status.restore_output(saved_output);

    match hull {
        Some(h) => {
            for i in 0..input_box.size() {
                if h.get(i) != input_box.get(i) {
                    status.mark_output(i);
                }
            }
            status.set_current(h);
        }
        None => {
            let mut emptied = input_box;
            emptied.set_empty();
            status.set_current(emptied);
            status.mark_all_output();
        }
    }

    Ok(())
}

#[cfg(test)]
mod contractor_tests {
    use super::*;
    use crate::symbolic::{Expression, Variable};

    fn unit_box() -> (Variable, IntervalBox) {
        let x = Variable::fresh("x", crate::symbolic::VariableType::Real);
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(-10.0, 10.0))]);
        (x, b)
    }

    #[test]
    fn seq_short_circuits_on_empty() {
        let (x, b) = unit_box();
        let xe = Expression::from(&x);

        let infeasible = Formula::geq(xe.clone(), Expression::constant(20.0));
        let harmless = Formula::leq(xe, Expression::constant(5.0));

        let seq = Contractor::seq(
            b.size(),
            vec![
                Contractor::fwd_bwd(&infeasible, &b).expect("usable"),
                Contractor::fwd_bwd(&harmless, &b).expect("usable"),
            ],
        );

        let mut status = ContractorStatus::new(b);
        seq.prune(&mut status).expect("uninterrupted");

        assert!(status.current().is_empty());
        // Only the refuting atom was used.
        assert_eq!(status.used_constraints().len(), 1);
    }

    #[test]
    fn join_hulls_surviving_branches() {
        let (x, b) = unit_box();
        let xe = Expression::from(&x);

        // x ≤ -1 ∨ x ≥ 1: the hull restores [-10, 10] except nothing is cut
        // around zero, so the join must not narrow past the union.
        let low = Formula::leq(xe.clone(), Expression::constant(-1.0));
        let high = Formula::geq(xe, Expression::constant(1.0));

        let join = Contractor::join(
            b.size(),
            vec![
                Contractor::fwd_bwd(&low, &b).expect("usable"),
                Contractor::fwd_bwd(&high, &b).expect("usable"),
            ],
        );

        let mut status = ContractorStatus::new(b);
        join.prune(&mut status).expect("uninterrupted");

        let component = status.current().get(0);
        assert_eq!(component.lo(), -10.0);
        assert_eq!(component.hi(), 10.0);
        assert!(!status.output().contains(0));
    }

    #[test]
    fn join_is_empty_only_when_all_branches_are() {
        let (x, b) = unit_box();
        let xe = Expression::from(&x);

        let far_low = Formula::leq(xe.clone(), Expression::constant(-20.0));
        let far_high = Formula::geq(xe, Expression::constant(20.0));

        let join = Contractor::join(
            b.size(),
            vec![
                Contractor::fwd_bwd(&far_low, &b).expect("usable"),
                Contractor::fwd_bwd(&far_high, &b).expect("usable"),
            ],
        );

        let mut status = ContractorStatus::new(b);
        join.prune(&mut status).expect("uninterrupted");

        assert!(status.current().is_empty());
    }

    #[test]
    fn fixpoint_converges_on_coupled_atoms() {
        let x = Variable::fresh("x", crate::symbolic::VariableType::Real);
        let y = Variable::fresh("y", crate::symbolic::VariableType::Real);
        let b = IntervalBox::new(vec![
            (x.clone(), Interval::new(0.0, 8.0)),
            (y.clone(), Interval::new(0.0, 8.0)),
        ]);

        // y = x / 2 ∧ x = y / 2 has only the origin.
        let half = Formula::eq(
            Expression::from(&y),
            Expression::from(&x) / Expression::constant(2.0),
        );
        let half_again = Formula::eq(
            Expression::from(&x),
            Expression::from(&y) / Expression::constant(2.0),
        );

        let fixpoint = Contractor::fixpoint(
            b.size(),
            default_termination_condition(0.01),
            vec![
                Contractor::fwd_bwd(&half, &b).expect("usable"),
                Contractor::fwd_bwd(&half_again, &b).expect("usable"),
            ],
        );

        let mut status = ContractorStatus::new(b);
        fixpoint.prune(&mut status).expect("uninterrupted");

        assert!(status.current().get(0).hi() < 1.0);
        assert!(status.current().get(1).hi() < 1.0);
    }

    #[test]
    fn worklist_matches_fixpoint_contraction() {
        let x = Variable::fresh("x", crate::symbolic::VariableType::Real);
        let y = Variable::fresh("y", crate::symbolic::VariableType::Real);
        let make_box = || {
            IntervalBox::new(vec![
                (x.clone(), Interval::new(0.0, 8.0)),
                (y.clone(), Interval::new(0.0, 8.0)),
            ])
        };

        let half = Formula::eq(
            Expression::from(&y),
            Expression::from(&x) / Expression::constant(2.0),
        );
        let half_again = Formula::eq(
            Expression::from(&x),
            Expression::from(&y) / Expression::constant(2.0),
        );

        let b = make_box();
        let children = vec![
            Contractor::fwd_bwd(&half, &b).expect("usable"),
            Contractor::fwd_bwd(&half_again, &b).expect("usable"),
        ];

        let worklist = Contractor::worklist_fixpoint(
            b.size(),
            default_termination_condition(0.01),
            children,
        );

        let mut status = ContractorStatus::new(make_box());
        worklist.prune(&mut status).expect("uninterrupted");

        assert!(status.current().get(0).hi() < 1.0);
        assert!(status.current().get(1).hi() < 1.0);
    }

    #[test]
    fn integer_bounds_round_inward() {
        let n = Variable::fresh("n", crate::symbolic::VariableType::Integer);
        let b = IntervalBox::new(vec![(n.clone(), Interval::new(0.3, 2.7))]);

        let contractor = Contractor::integer_bounds(&b).expect("integer dimension");
        let mut status = ContractorStatus::new(b);
        contractor.prune(&mut status).expect("uninterrupted");

        assert_eq!(status.current().get(0), Interval::new(1.0, 2.0));
    }

    #[test]
    fn contraction_law_holds_through_composition() {
        let (x, b) = unit_box();
        let xe = Expression::from(&x);

        let atoms = [
            Formula::leq(xe.clone(), Expression::constant(4.0)),
            Formula::geq(xe.clone(), Expression::constant(-3.0)),
            Formula::eq(xe.clone() * xe, Expression::constant(2.0)),
        ];
        let children = atoms
            .iter()
            .filter_map(|a| Contractor::fwd_bwd(a, &b))
            .collect::<Vec<_>>();
        let composite =
            Contractor::fixpoint(b.size(), default_termination_condition(0.01), children);

        let before = b.clone();
        let mut status = ContractorStatus::new(b);
        composite.prune(&mut status).expect("uninterrupted");

        for i in 0..before.size() {
            assert!(status.current().get(i).is_subset_of(&before.get(i)));
        }
    }
}
