/*!
The forward/backward contractor for a single arithmetic atom.

One pruning pass evaluates the atom's expression tree forward --- computing the interval image of every node --- and then propagates the atom's codomain backward, projecting each node's constrained range onto its children and, at the leaves, intersecting the box components.

The pass is a projection, not a decision: it never removes a point satisfying the atom, and narrows or leaves the box unchanged.
An atom whose interval form cannot usefully constrain a box (a disequality, or an atom without variables) yields no contractor at all, and the [builder](crate::contractor::Contractor::fwd_bwd) elides it.
*/

use std::f64::consts::{FRAC_PI_2, PI};

use crate::interval::boxes::IntervalBox;
use crate::interval::Interval;
use crate::misc::log::targets;
use crate::symbolic::{
    Expression, ExpressionNode, Formula, FormulaNode, RelationalOperator, Variable,
};

use super::status::ContractorStatus;

/// Signals an emptied box during backward propagation.
struct EmptiedBox;

/// Margin applied to inverse trigonometric bounds, covering the library error.
fn widened(i: Interval) -> Interval {
    i.inflate(1e-12)
}

/// The interval image of `[acos(t.lo), acos(t.hi)]`, reversed for monotonicity.
fn acos_range(t: &Interval) -> Interval {
    widened(Interval::new(t.hi().min(1.0).acos(), t.lo().max(-1.0).acos()))
}

fn asin_range(t: &Interval) -> Interval {
    widened(Interval::new(t.lo().max(-1.0).asin(), t.hi().min(1.0).asin()))
}

fn atan_range(t: &Interval) -> Interval {
    widened(Interval::new(t.lo().atan(), t.hi().atan()))
}

/// A single atom, prepared for forward/backward pruning.
pub struct FwdBwd {
    /// The literal as asserted, recorded when the pass narrows the box.
    literal: Formula,

    /// lhs − rhs of the atom.
    difference: Expression,

    /// The range the difference is constrained to.
    codomain: Interval,
}

impl FwdBwd {
    /// Prepares `literal` --- an atom or a negated atom --- for pruning.
    ///
    /// None when the literal has no usable interval form: a disequality, a boolean
    /// or quantified literal, or an atom without variables.
    pub fn try_new(literal: &Formula) -> Option<FwdBwd> {
        let (atom, negated) = match literal.node() {
            FormulaNode::Not(inner) => (inner, true),
            _ => (literal, false),
        };

        let FormulaNode::Relation(op, lhs, rhs) = atom.node() else {
            return None;
        };

        let op = if negated { op.negated() } else { *op };
        let codomain = match op {
            RelationalOperator::Eq => Interval::point(0.0),
            RelationalOperator::Leq | RelationalOperator::Lt => {
                Interval::new(f64::NEG_INFINITY, 0.0)
            }
            RelationalOperator::Geq | RelationalOperator::Gt => {
                Interval::new(0.0, f64::INFINITY)
            }
            // A disequality removes a measure-zero set; there is nothing to
            // project onto a box.
            RelationalOperator::Neq => return None,
        };

        let difference = lhs.clone() - rhs.clone();
        if difference.variables().is_empty() {
            return None;
        }

        Some(FwdBwd {
            literal: literal.clone(),
            difference,
            codomain,
        })
    }

    /// The variables the atom reads.
    pub fn variables(&self) -> std::collections::BTreeSet<Variable> {
        self.difference.variables()
    }

    /// One forward/backward pass over the box in `status`.
    pub fn prune(&self, status: &mut ContractorStatus) {
        let old = status.current().interval_vector().to_vec();

        let emptied = narrow(&self.difference, self.codomain, status.current_mut()).is_err();

        if emptied {
            status.current_mut().set_empty();
            status.mark_all_output();
            status.add_used_constraint(&self.literal);
            log::trace!(target: targets::PRUNE, "{} refutes the box.", self.literal);
            return;
        }

        let mut changed = false;
        for (i, old_component) in old.iter().enumerate() {
            if status.current().get(i) != *old_component {
                status.mark_output(i);
                changed = true;
            }
        }

        if changed {
            status.add_used_constraint(&self.literal);
            log::trace!(target: targets::PRUNE, "{} narrowed the box.", self.literal);
        }
    }
}

/// The forward image of `expr` on `b`.
fn forward(expr: &Expression, b: &IntervalBox) -> Interval {
    crate::evaluator::expression_range(expr, &|v: &Variable| {
        b.interval_of(v).unwrap_or(Interval::ENTIRE)
    })
}

/// Projects `expected` onto `expr`, narrowing the components of `b`.
///
/// Every projection is outward rounded, so no point with a satisfying image is removed.
fn narrow(expr: &Expression, expected: Interval, b: &mut IntervalBox) -> Result<(), EmptiedBox> {
    use ExpressionNode::*;

    let range = forward(expr, b);
    let target = expected.intersect(&range);
    if target.is_empty() {
        return Err(EmptiedBox);
    }

    match expr.node() {
        Constant(_) => Ok(()),

        Var(v) => {
            if let Some(i) = b.index(v) {
                let narrowed = b.get(i).intersect(&target);
                if narrowed.is_empty() {
                    return Err(EmptiedBox);
                }
                b.set(i, narrowed);
            }
            Ok(())
        }

        Neg(a) => narrow(a, target.neg(), b),

        Add(lhs, rhs) => {
            let left = forward(lhs, b);
            let right = forward(rhs, b);
            narrow(lhs, target.sub(&right), b)?;
            narrow(rhs, target.sub(&left), b)
        }

        Sub(lhs, rhs) => {
            let left = forward(lhs, b);
            let right = forward(rhs, b);
            narrow(lhs, target.add(&right), b)?;
            narrow(rhs, left.sub(&target), b)
        }

        Mul(lhs, rhs) => {
            let left = forward(lhs, b);
            let right = forward(rhs, b);
            narrow(lhs, target.div(&right), b)?;
            narrow(rhs, target.div(&left), b)
        }

        Div(lhs, rhs) => {
            let left = forward(lhs, b);
            let right = forward(rhs, b);
            narrow(lhs, target.mul(&right), b)?;
            narrow(rhs, left.div(&target), b)
        }

        Pow(a, n) => {
            if *n == 0 {
                return Ok(());
            }
            let (inner_target, n) = if *n < 0 {
                (Interval::point(1.0).div(&target), -n)
            } else {
                (target, *n)
            };
            let root = inner_target.rootn(n);
            if root.is_empty() {
                return Err(EmptiedBox);
            }
            let child = forward(a, b);
            let preimage = if n % 2 == 0 {
                if child.lo() >= 0.0 {
                    root
                } else if child.hi() <= 0.0 {
                    root.neg()
                } else {
                    root.hull(&root.neg())
                }
            } else {
                root
            };
            narrow(a, preimage, b)
        }

        Sqrt(a) => {
            let non_negative = target.intersect(&Interval::new(0.0, f64::INFINITY));
            if non_negative.is_empty() {
                return Err(EmptiedBox);
            }
            narrow(a, non_negative.sqr(), b)
        }

        Exp(a) => narrow(a, target.log(), b),

        Log(a) => narrow(a, target.exp(), b),

        Sin(a) => {
            let child = forward(a, b);
            if !child.lo().is_finite() || !child.hi().is_finite() {
                return Ok(());
            }
            // sin is monotone on [kπ − π/2, kπ + π/2]; project only when the
            // child sits inside one such branch.
            let k = ((child.lo() + FRAC_PI_2) / PI).floor();
            if child.hi() > (k + 1.0) * PI - FRAC_PI_2 {
                return Ok(());
            }
            let t = target.intersect(&Interval::new(-1.0, 1.0));
            if t.is_empty() {
                return Err(EmptiedBox);
            }
            let base = if (k as i64) % 2 == 0 {
                asin_range(&t)
            } else {
                asin_range(&t).neg()
            };
            narrow(a, base.add(&Interval::point(k * PI)), b)
        }

        Cos(a) => {
            let child = forward(a, b);
            if !child.lo().is_finite() || !child.hi().is_finite() {
                return Ok(());
            }
            // cos is monotone on [kπ, (k + 1)π].
            let k = (child.lo() / PI).floor();
            if child.hi() > (k + 1.0) * PI {
                return Ok(());
            }
            let t = target.intersect(&Interval::new(-1.0, 1.0));
            if t.is_empty() {
                return Err(EmptiedBox);
            }
            let base = if (k as i64) % 2 == 0 {
                acos_range(&t)
            } else {
                acos_range(&t.neg())
            };
            narrow(a, base.add(&Interval::point(k * PI)), b)
        }

        Tan(a) => {
            let child = forward(a, b);
            if !child.lo().is_finite() || !child.hi().is_finite() {
                return Ok(());
            }
            // tan is monotone on (kπ − π/2, kπ + π/2).
            let k = ((child.lo() + FRAC_PI_2) / PI).floor();
            if child.hi() > (k + 1.0) * PI - FRAC_PI_2 {
                return Ok(());
            }
            narrow(a, atan_range(&target).add(&Interval::point(k * PI)), b)
        }

        Abs(a) => {
            let non_negative = target.intersect(&Interval::new(0.0, f64::INFINITY));
            if non_negative.is_empty() {
                return Err(EmptiedBox);
            }
            let child = forward(a, b);
            let preimage = if child.lo() >= 0.0 {
                non_negative
            } else if child.hi() <= 0.0 {
                non_negative.neg()
            } else {
                non_negative.hull(&non_negative.neg())
            };
            narrow(a, preimage, b)
        }

        Min(lhs, rhs) => {
            let left = forward(lhs, b);
            let right = forward(rhs, b);
            let at_least = Interval::new(target.lo(), f64::INFINITY);

            // When the other side sits above the target, this side is the minimum.
            if right.lo() > target.hi() {
                narrow(lhs, target, b)?;
            } else {
                narrow(lhs, at_least, b)?;
            }
            if left.lo() > target.hi() {
                narrow(rhs, target, b)
            } else {
                narrow(rhs, at_least, b)
            }
        }

        Max(lhs, rhs) => {
            let left = forward(lhs, b);
            let right = forward(rhs, b);
            let at_most = Interval::new(f64::NEG_INFINITY, target.hi());

            if right.hi() < target.lo() {
                narrow(lhs, target, b)?;
            } else {
                narrow(lhs, at_most, b)?;
            }
            if left.hi() < target.lo() {
                narrow(rhs, target, b)
            } else {
                narrow(rhs, at_most, b)
            }
        }
    }
}

#[cfg(test)]
mod fwdbwd_tests {
    use super::*;
    use crate::symbolic::VariableType;

    fn prune_once(literal: &Formula, b: IntervalBox) -> ContractorStatus {
        let contractor = FwdBwd::try_new(literal).expect("usable literal");
        let mut status = ContractorStatus::new(b);
        contractor.prune(&mut status);
        status
    }

    #[test]
    fn linear_bound_narrows() {
        let x = Variable::fresh("x", VariableType::Real);
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(-10.0, 10.0))]);

        // x ≤ 1
        let literal = Formula::leq(Expression::from(&x), Expression::constant(1.0));
        let status = prune_once(&literal, b);

        let narrowed = status.current().get(0);
        assert!(narrowed.hi() <= 1.0 + 1e-9);
        assert_eq!(narrowed.lo(), -10.0);
        assert!(status.output().contains(0));
        assert_eq!(status.used_constraints(), &[literal]);
    }

    #[test]
    fn square_projects_both_signs() {
        let x = Variable::fresh("x", VariableType::Real);
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(-10.0, 10.0))]);

        // x² = 2
        let literal = Formula::eq(Expression::from(&x).pow(2), Expression::constant(2.0));
        let status = prune_once(&literal, b);

        let narrowed = status.current().get(0);
        let root = 2.0_f64.sqrt();
        assert!(narrowed.contains(root) && narrowed.contains(-root));
        assert!(narrowed.hi() <= root + 1e-6);
        assert!(narrowed.lo() >= -root - 1e-6);
    }

    #[test]
    fn infeasible_atom_empties_the_box() {
        let x = Variable::fresh("x", VariableType::Real);
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(0.0, 1.0))]);

        // x ≥ 2 on [0, 1]
        let literal = Formula::geq(Expression::from(&x), Expression::constant(2.0));
        let status = prune_once(&literal, b);

        assert!(status.current().is_empty());
        assert_eq!(status.used_constraints().len(), 1);
    }

    #[test]
    fn zero_effect_prune_records_nothing() {
        let x = Variable::fresh("x", VariableType::Real);
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(0.0, 1.0))]);

        // x ≥ -1 cannot narrow [0, 1].
        let literal = Formula::geq(Expression::from(&x), Expression::constant(-1.0));
        let status = prune_once(&literal, b);

        assert!(status.used_constraints().is_empty());
        assert!(status.output().is_clear());
    }

    #[test]
    fn disequalities_are_elided() {
        let x = Variable::fresh("x", VariableType::Real);
        let literal = Formula::neq(Expression::from(&x), Expression::constant(0.0));

        assert!(FwdBwd::try_new(&literal).is_none());
    }

    #[test]
    fn sine_projects_within_a_monotone_branch() {
        let x = Variable::fresh("x", VariableType::Real);
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(-1.0, 1.0))]);

        // sin(x) = 0.5, x in a single monotone branch.
        let literal = Formula::eq(Expression::from(&x).sin(), Expression::constant(0.5));
        let status = prune_once(&literal, b);

        let narrowed = status.current().get(0);
        let root = 0.5_f64.asin();
        assert!(narrowed.contains(root));
        assert!(narrowed.diam() < 0.1);
    }
}
