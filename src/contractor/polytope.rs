/*!
A linear-relaxation contractor over the asserted atoms.

The linear subset of the asserted atoms is kept jointly, as rows `Σ cᵢ·xᵢ + k ∈ codomain`.
A pruning pass sweeps the rows, isolating each variable of each row against the interval hull of the others:

```none
xᵢ  ⊆  (codomain − k − Σ_{j≠i} cⱼ·xⱼ) / cᵢ
```

One row's tightening feeds the next row's, so a sweep over the whole system contracts more than the same atoms pruned one at a time --- which is what the per-atom [forward/backward](crate::contractor::fwdbwd) pass does.
Nonlinear atoms contribute no row and are untouched here.
*/

use crate::interval::Interval;
use crate::misc::log::targets;
use crate::symbolic::{Formula, FormulaNode, RelationalOperator};

use super::status::ContractorStatus;
use crate::interval::boxes::IntervalBox;

struct Row {
    /// The literal the row was built from, recorded on narrowing.
    literal: Formula,

    /// Nonzero coefficients by box dimension.
    coefficients: Vec<(usize, f64)>,

    constant: f64,

    codomain: Interval,
}

/// The linear rows of a set of asserted atoms.
pub struct Polytope {
    rows: Vec<Row>,
}

/// How many times the row system is swept per prune.
const SWEEPS: usize = 2;

impl Polytope {
    /// Collects the linear rows of `literals` against the dimensions of `b`.
    ///
    /// None when no literal is linear.
    pub fn try_new(literals: &[Formula], b: &IntervalBox) -> Option<Polytope> {
        let mut rows = Vec::new();

        for literal in literals {
            let (atom, negated) = match literal.node() {
                FormulaNode::Not(inner) => (inner, true),
                _ => (literal, false),
            };
            let FormulaNode::Relation(op, lhs, rhs) = atom.node() else {
                continue;
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
                RelationalOperator::Neq => continue,
            };

            let difference = lhs.clone() - rhs.clone();
            let Some((coefficient_map, constant)) = difference.linear_form() else {
                continue;
            };

            let mut coefficients = Vec::with_capacity(coefficient_map.len());
            for (variable, coefficient) in coefficient_map {
                if coefficient == 0.0 {
                    continue;
                }
                let Some(i) = b.index(&variable) else {
                    continue;
                };
                coefficients.push((i, coefficient));
            }
            if coefficients.is_empty() {
                continue;
            }
            coefficients.sort_by_key(|(i, _)| *i);

            rows.push(Row {
                literal: literal.clone(),
                coefficients,
                constant,
                codomain,
            });
        }

        if rows.is_empty() {
            None
        } else {
            Some(Polytope { rows })
        }
    }

    /// The box dimensions read by some row.
    pub fn dimensions(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .flat_map(|row| row.coefficients.iter().map(|(i, _)| *i))
    }

    pub fn prune(&self, status: &mut ContractorStatus) {
        for _ in 0..SWEEPS {
            for row in &self.rows {
                if !tighten_row(row, status) {
                    log::trace!(target: targets::PRUNE, "{} refutes the box (polytope).", row.literal);
                    return;
                }
            }
        }
    }
}

/// Isolates each variable of `row`; false when the box was emptied.
fn tighten_row(row: &Row, status: &mut ContractorStatus) -> bool {
    // codomain ∋ Σ cⱼ·xⱼ + k, so each xᵢ ⊆ (codomain − k − Σ_{j≠i}) / cᵢ.
    let residual_base = row.codomain.sub(&Interval::point(row.constant));

    for (position, &(i, coefficient)) in row.coefficients.iter().enumerate() {
        let mut others = Interval::point(0.0);
        for (other_position, &(j, other_coefficient)) in row.coefficients.iter().enumerate() {
            if other_position == position {
                continue;
            }
            let term = status
                .current()
                .get(j)
                .mul(&Interval::point(other_coefficient));
            others = others.add(&term);
        }

        let candidate = residual_base
            .sub(&others)
            .div(&Interval::point(coefficient));
        let narrowed = status.current().get(i).intersect(&candidate);

        if narrowed.is_empty() {
            status.current_mut().set_empty();
            status.mark_all_output();
            status.add_used_constraint(&row.literal);
            return false;
        }

        if narrowed != status.current().get(i) {
            status.current_mut().set(i, narrowed);
            status.mark_output(i);
            status.add_used_constraint(&row.literal);
        }
    }

    true
}

#[cfg(test)]
mod polytope_tests {
    use super::*;
    use crate::symbolic::{Expression, Variable, VariableType};

    #[test]
    fn coupled_rows_tighten_jointly() {
        let x = Variable::fresh("x", VariableType::Real);
        let y = Variable::fresh("y", VariableType::Real);
        let b = IntervalBox::new(vec![
            (x.clone(), Interval::new(0.0, 10.0)),
            (y.clone(), Interval::new(0.0, 10.0)),
        ]);

        // x + y ≤ 4 and y ≥ 3 force x ≤ 1.
        let sum = Formula::leq(
            Expression::from(&x) + Expression::from(&y),
            Expression::constant(4.0),
        );
        let floor = Formula::geq(Expression::from(&y), Expression::constant(3.0));

        let polytope = Polytope::try_new(&[sum, floor], &b).expect("linear rows");
        let mut status = ContractorStatus::new(b);
        polytope.prune(&mut status);

        assert!(status.current().get(0).hi() <= 1.0 + 1e-9);
        assert!(status.current().get(1).lo() >= 3.0 - 1e-9);
    }

    #[test]
    fn contradictory_rows_empty_the_box() {
        let x = Variable::fresh("x", VariableType::Real);
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(0.0, 10.0))]);

        let lower = Formula::geq(Expression::from(&x), Expression::constant(6.0));
        let upper = Formula::leq(Expression::from(&x), Expression::constant(5.0));

        let polytope = Polytope::try_new(&[lower, upper], &b).expect("linear rows");
        let mut status = ContractorStatus::new(b);
        polytope.prune(&mut status);

        assert!(status.current().is_empty());
    }

    #[test]
    fn nonlinear_atoms_contribute_nothing() {
        let x = Variable::fresh("x", VariableType::Real);
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(0.0, 10.0))]);

        let xe = Expression::from(&x);
        let square = Formula::leq(xe.clone() * xe, Expression::constant(4.0));

        assert!(Polytope::try_new(&[square], &b).is_none());
    }
}
