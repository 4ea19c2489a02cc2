/*!
Interval evaluation of asserted atoms.

A [FormulaEvaluator] holds one theory literal --- an arithmetic atom, a quantified subformula, or the negation of either --- and classifies a [box](IntervalBox) against it:

- [True](Evaluation::True): the literal holds, δ-relaxed, on every point of the box.
  The atom is δ-satisfied and needs no further propagation on this branch.
- [False](Evaluation::False): the literal holds on no point of the box.
  The branch is refuted, without relaxation, so an *unsat* built from False answers is sound for the original formula.
- [Unknown](Evaluation::Unknown): neither, and the dimensions the literal reads remain worth branching on.

The asymmetry is deliberate: True is judged against the δ-weakened comparison, False against the exact one.
*/

use std::collections::BTreeSet;

use crate::contractor::DynamicBitset;
use crate::interval::boxes::IntervalBox;
use crate::interval::Interval;
use crate::symbolic::{
    Expression, ExpressionNode, Formula, FormulaNode, QuantifiedBound, RelationalOperator,
    Variable,
};
use crate::types::err::{ErrorKind, UnsupportedError};

/// The classification of a box against one literal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Evaluation {
    /// δ-relaxed, the literal holds on every point.
    True,

    /// The literal holds on no point.
    False,

    /// Neither established.
    Unknown,
}

/// The interval image of an expression under a variable environment.
pub fn expression_range<F: Fn(&Variable) -> Interval>(expr: &Expression, lookup: &F) -> Interval {
    use ExpressionNode::*;
    match expr.node() {
        Constant(c) => Interval::point(*c),
        Var(v) => lookup(v),
        Neg(a) => expression_range(a, lookup).neg(),
        Add(a, b) => expression_range(a, lookup).add(&expression_range(b, lookup)),
        Sub(a, b) => expression_range(a, lookup).sub(&expression_range(b, lookup)),
        Mul(a, b) => expression_range(a, lookup).mul(&expression_range(b, lookup)),
        Div(a, b) => expression_range(a, lookup).div(&expression_range(b, lookup)),
        Pow(a, n) => expression_range(a, lookup).powi(*n),
        Sqrt(a) => expression_range(a, lookup).sqrt(),
        Exp(a) => expression_range(a, lookup).exp(),
        Log(a) => expression_range(a, lookup).log(),
        Sin(a) => expression_range(a, lookup).sin(),
        Cos(a) => expression_range(a, lookup).cos(),
        Tan(a) => expression_range(a, lookup).tan(),
        Abs(a) => expression_range(a, lookup).abs(),
        Min(a, b) => expression_range(a, lookup).min(&expression_range(b, lookup)),
        Max(a, b) => expression_range(a, lookup).max(&expression_range(b, lookup)),
    }
}

/// Classifies the range of (lhs − rhs) against a comparison with zero.
fn classify(op: RelationalOperator, range: Interval, delta: f64) -> Evaluation {
    use RelationalOperator::*;

    if range.is_empty() {
        // The atom reads an empty region; nothing violates it.
        return Evaluation::True;
    }

    match op {
        Eq => {
            if range.is_subset_of(&Interval::new(-delta, delta)) {
                Evaluation::True
            } else if !range.contains(0.0) {
                Evaluation::False
            } else {
                Evaluation::Unknown
            }
        }

        Neq => {
            if !range.contains(0.0) {
                Evaluation::True
            } else if range.is_degenerate() {
                Evaluation::False
            } else {
                Evaluation::Unknown
            }
        }

        Leq => {
            if range.hi() <= delta {
                Evaluation::True
            } else if range.lo() > 0.0 {
                Evaluation::False
            } else {
                Evaluation::Unknown
            }
        }

        Lt => {
            if range.hi() <= delta {
                Evaluation::True
            } else if range.lo() >= 0.0 {
                Evaluation::False
            } else {
                Evaluation::Unknown
            }
        }

        Geq => {
            if range.lo() >= -delta {
                Evaluation::True
            } else if range.hi() < 0.0 {
                Evaluation::False
            } else {
                Evaluation::Unknown
            }
        }

        Gt => {
            if range.lo() >= -delta {
                Evaluation::True
            } else if range.hi() <= 0.0 {
                Evaluation::False
            } else {
                Evaluation::Unknown
            }
        }
    }
}

/// Evaluates a quantifier-free formula under a variable environment.
///
/// Conjunction and disjunction take the three-valued meet and join; negation swaps True and False.
pub fn evaluate_formula(
    formula: &Formula,
    delta: f64,
    lookup: &dyn Fn(&Variable) -> Interval,
) -> Evaluation {
    match formula.node() {
        FormulaNode::True => Evaluation::True,
        FormulaNode::False => Evaluation::False,

        // A boolean variable carries no interval information.
        FormulaNode::BoolVar(_) => Evaluation::Unknown,

        FormulaNode::Relation(op, lhs, rhs) => {
            let range = expression_range(&(lhs.clone() - rhs.clone()), &lookup);
            classify(*op, range, delta)
        }

        FormulaNode::Not(inner) => match evaluate_formula(inner, delta, lookup) {
            Evaluation::True => Evaluation::False,
            Evaluation::False => Evaluation::True,
            Evaluation::Unknown => Evaluation::Unknown,
        },

        FormulaNode::And(fs) => {
            let mut all_true = true;
            for f in fs {
                match evaluate_formula(f, delta, lookup) {
                    Evaluation::False => return Evaluation::False,
                    Evaluation::Unknown => all_true = false,
                    Evaluation::True => {}
                }
            }
            if all_true {
                Evaluation::True
            } else {
                Evaluation::Unknown
            }
        }

        FormulaNode::Or(fs) => {
            let mut all_false = true;
            for f in fs {
                match evaluate_formula(f, delta, lookup) {
                    Evaluation::True => return Evaluation::True,
                    Evaluation::Unknown => all_false = false,
                    Evaluation::False => {}
                }
            }
            if all_false {
                Evaluation::False
            } else {
                Evaluation::Unknown
            }
        }

        FormulaNode::Forall(bounds, body) => {
            let bounded = |v: &Variable| -> Interval {
                for bound in bounds {
                    if bound.variable == *v {
                        return bound.domain;
                    }
                }
                lookup(v)
            };
            evaluate_formula(body, delta, &bounded)
        }
    }
}

enum EvaluatorKind {
    Relation {
        op: RelationalOperator,
        /// lhs − rhs of the atom.
        difference: Expression,
    },
    Quantified {
        bounds: Vec<QuantifiedBound>,
        body: Formula,
    },
    /// A quantifier-free formula evaluated recursively, used by inner searches.
    General(Formula),
}

/// One theory literal, ready to classify boxes.
pub struct FormulaEvaluator {
    literal: Formula,
    kind: EvaluatorKind,
    free_variables: BTreeSet<Variable>,
    delta: f64,
}

/// Rejects bodies the theory layer cannot evaluate under a quantifier.
pub(crate) fn check_quantified_body(body: &Formula) -> Result<(), ErrorKind> {
    match body.node() {
        FormulaNode::True | FormulaNode::False | FormulaNode::Relation(..) => Ok(()),
        FormulaNode::BoolVar(_) => Err(UnsupportedError::QuantifiedBoolean.into()),
        FormulaNode::Forall(..) => Err(UnsupportedError::NestedQuantifier.into()),
        FormulaNode::Not(inner) => check_quantified_body(inner),
        FormulaNode::And(fs) | FormulaNode::Or(fs) => {
            for f in fs {
                check_quantified_body(f)?;
            }
            Ok(())
        }
    }
}

impl FormulaEvaluator {
    /// Builds an evaluator for a theory literal.
    ///
    /// The literal is an atom, or a [Not](FormulaNode::Not) wrapping one; negation is folded into the comparison.
    pub fn new(literal: &Formula, delta: f64) -> Result<Self, ErrorKind> {
        let (atom, negated) = match literal.node() {
            FormulaNode::Not(inner) => (inner.clone(), true),
            _ => (literal.clone(), false),
        };

        let kind = match atom.node() {
            FormulaNode::Relation(op, lhs, rhs) => {
                let op = if negated { op.negated() } else { *op };
                EvaluatorKind::Relation {
                    op,
                    difference: lhs.clone() - rhs.clone(),
                }
            }

            FormulaNode::Forall(bounds, body) => {
                if negated {
                    return Err(UnsupportedError::NegatedQuantifier.into());
                }
                check_quantified_body(body)?;
                EvaluatorKind::Quantified {
                    bounds: bounds.clone(),
                    body: body.clone(),
                }
            }

            _ => return Err(UnsupportedError::NonArithmeticLiteral.into()),
        };

        Ok(FormulaEvaluator {
            free_variables: literal.free_variables(),
            literal: literal.clone(),
            kind,
            delta,
        })
    }

    /// An evaluator for a whole quantifier-free formula.
    ///
    /// Inner searches classify against their search formula directly, without
    /// an abstraction layer in between.
    pub fn general(formula: &Formula, delta: f64) -> Self {
        FormulaEvaluator {
            free_variables: formula.free_variables(),
            literal: formula.clone(),
            kind: EvaluatorKind::General(formula.clone()),
            delta,
        }
    }

    /// The literal the evaluator classifies against, as asserted.
    pub fn literal(&self) -> &Formula {
        &self.literal
    }

    /// The free variables the literal reads.
    pub fn variables(&self) -> &BTreeSet<Variable> {
        &self.free_variables
    }

    /// Classifies `b` against the literal.
    pub fn evaluate(&self, b: &IntervalBox) -> Evaluation {
        let lookup = |v: &Variable| b.interval_of(v).unwrap_or(Interval::ENTIRE);

        match &self.kind {
            EvaluatorKind::Relation { op, difference } => {
                classify(*op, expression_range(difference, &lookup), self.delta)
            }

            EvaluatorKind::Quantified { bounds, body } => {
                // Evaluating the body with each quantified variable at its full
                // domain decides the universal: True over the hull is True at
                // every instance, and False over the hull implies a violated
                // instance exists.
                let bounded = |v: &Variable| -> Interval {
                    for bound in bounds {
                        if bound.variable == *v {
                            return bound.domain;
                        }
                    }
                    lookup(v)
                };
                evaluate_formula(body, self.delta, &bounded)
            }

            EvaluatorKind::General(formula) => evaluate_formula(formula, self.delta, &lookup),
        }
    }

    /// Marks the box dimensions the literal reads in `bits`.
    pub fn mark_dimensions(&self, b: &IntervalBox, bits: &mut DynamicBitset) {
        for variable in &self.free_variables {
            if let Some(i) = b.index(variable) {
                bits.insert(i);
            }
        }
    }
}

#[cfg(test)]
mod evaluator_tests {
    use super::*;
    use crate::symbolic::VariableType;

    const DELTA: f64 = 0.001;

    fn x_box(lo: f64, hi: f64) -> (Variable, IntervalBox) {
        let x = Variable::fresh("x", VariableType::Real);
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(lo, hi))]);
        (x, b)
    }

    #[test]
    fn tight_equality_is_delta_true() {
        let (x, b) = x_box(1.41421, 1.41422);

        let atom = Formula::eq(
            Expression::from(&x) * Expression::from(&x),
            Expression::constant(2.0),
        );
        let evaluator = FormulaEvaluator::new(&atom, DELTA).expect("atom");

        assert_eq!(evaluator.evaluate(&b), Evaluation::True);
    }

    #[test]
    fn unreachable_bound_is_false() {
        let (x, b) = x_box(0.0, 1.0);

        let atom = Formula::geq(Expression::from(&x), Expression::constant(2.0));
        let evaluator = FormulaEvaluator::new(&atom, DELTA).expect("atom");

        assert_eq!(evaluator.evaluate(&b), Evaluation::False);
    }

    #[test]
    fn wide_box_is_unknown() {
        let (x, b) = x_box(-10.0, 10.0);

        let atom = Formula::eq(
            Expression::from(&x) * Expression::from(&x),
            Expression::constant(2.0),
        );
        let evaluator = FormulaEvaluator::new(&atom, DELTA).expect("atom");

        assert_eq!(evaluator.evaluate(&b), Evaluation::Unknown);
    }

    #[test]
    fn negation_folds_into_the_comparison() {
        let (x, b) = x_box(0.0, 1.0);

        // ¬(x ≥ 2) is x < 2, true on [0, 1].
        let literal = Formula::geq(Expression::from(&x), Expression::constant(2.0)).negate();
        let evaluator = FormulaEvaluator::new(&literal, DELTA).expect("literal");

        assert_eq!(evaluator.evaluate(&b), Evaluation::True);
    }

    #[test]
    fn universal_atom_uses_the_quantified_domain() {
        let (x, b) = x_box(0.5, 0.6);
        let z = Variable::fresh("z", VariableType::Real);

        // ∀z ∈ [0,1]. x + z ≥ 0 — true when x ≥ 0.
        let body = Formula::geq(
            Expression::from(&x) + Expression::from(&z),
            Expression::constant(0.0),
        );
        let quantified = Formula::forall(
            vec![QuantifiedBound {
                variable: z,
                domain: Interval::new(0.0, 1.0),
            }],
            body,
        );
        let evaluator = FormulaEvaluator::new(&quantified, DELTA).expect("quantified");

        assert_eq!(evaluator.evaluate(&b), Evaluation::True);
    }
}
