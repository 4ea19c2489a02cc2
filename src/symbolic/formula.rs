/*!
First-order formulas over [expressions](super::Expression).

A [Formula] decomposes into *atoms* --- arithmetic (dis)equalities and (strict) inequalities, and universally quantified subformulas --- combined by boolean connectives.
Like expressions, formulas are immutable and structurally shared.

Structural equality and hashing are what the [bridge](crate::bridge) keys its abstraction maps on: the same atom, however many times it is built, maps to the same boolean variable.
*/

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::interval::Interval;

use super::{Expression, Variable};

/// The comparison of an arithmetic atom.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RelationalOperator {
    Eq,
    Neq,
    Leq,
    Lt,
    Geq,
    Gt,
}

impl RelationalOperator {
    /// The operator of the negated atom: ¬(a ≤ b) is a > b, and so on.
    pub fn negated(self) -> Self {
        match self {
            Self::Eq => Self::Neq,
            Self::Neq => Self::Eq,
            Self::Leq => Self::Gt,
            Self::Lt => Self::Geq,
            Self::Geq => Self::Lt,
            Self::Gt => Self::Leq,
        }
    }
}

/// A quantified variable together with its domain.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantifiedBound {
    pub variable: Variable,
    pub domain: Interval,
}

/// A node of a formula tree.
#[derive(Debug, PartialEq)]
pub enum FormulaNode {
    True,
    False,

    /// A boolean variable, an atom of the boolean layer.
    BoolVar(Variable),

    /// An arithmetic atom.
    Relation(RelationalOperator, Expression, Expression),

    Not(Formula),
    And(Vec<Formula>),
    Or(Vec<Formula>),

    /// A universally quantified subformula, an atom of the theory layer.
    Forall(Vec<QuantifiedBound>, Formula),
}

/// A handle to an immutable formula tree.
#[derive(Clone, Debug)]
pub struct Formula {
    node: Rc<FormulaNode>,
}

impl Formula {
    fn wrap(node: FormulaNode) -> Self {
        Formula {
            node: Rc::new(node),
        }
    }

    pub fn node(&self) -> &FormulaNode {
        &self.node
    }

    pub fn tt() -> Self {
        Self::wrap(FormulaNode::True)
    }

    pub fn ff() -> Self {
        Self::wrap(FormulaNode::False)
    }

    pub fn boolean(var: &Variable) -> Self {
        Self::wrap(FormulaNode::BoolVar(var.clone()))
    }

    pub fn relation(op: RelationalOperator, lhs: Expression, rhs: Expression) -> Self {
        Self::wrap(FormulaNode::Relation(op, lhs, rhs))
    }

    pub fn eq(lhs: Expression, rhs: Expression) -> Self {
        Self::relation(RelationalOperator::Eq, lhs, rhs)
    }

    pub fn neq(lhs: Expression, rhs: Expression) -> Self {
        Self::relation(RelationalOperator::Neq, lhs, rhs)
    }

    pub fn leq(lhs: Expression, rhs: Expression) -> Self {
        Self::relation(RelationalOperator::Leq, lhs, rhs)
    }

    pub fn lt(lhs: Expression, rhs: Expression) -> Self {
        Self::relation(RelationalOperator::Lt, lhs, rhs)
    }

    pub fn geq(lhs: Expression, rhs: Expression) -> Self {
        Self::relation(RelationalOperator::Geq, lhs, rhs)
    }

    pub fn gt(lhs: Expression, rhs: Expression) -> Self {
        Self::relation(RelationalOperator::Gt, lhs, rhs)
    }

    /// The conjunction of `conjuncts`, with units simplified away.
    pub fn and(conjuncts: Vec<Formula>) -> Self {
        let mut kept = Vec::with_capacity(conjuncts.len());
        for f in conjuncts {
            match f.node() {
                FormulaNode::True => {}
                FormulaNode::False => return Self::ff(),
                _ => kept.push(f),
            }
        }
        match kept.len() {
            0 => Self::tt(),
            1 => kept.pop().unwrap(),
            _ => Self::wrap(FormulaNode::And(kept)),
        }
    }

    /// The disjunction of `disjuncts`, with units simplified away.
    pub fn or(disjuncts: Vec<Formula>) -> Self {
        let mut kept = Vec::with_capacity(disjuncts.len());
        for f in disjuncts {
            match f.node() {
                FormulaNode::False => {}
                FormulaNode::True => return Self::tt(),
                _ => kept.push(f),
            }
        }
        match kept.len() {
            0 => Self::ff(),
            1 => kept.pop().unwrap(),
            _ => Self::wrap(FormulaNode::Or(kept)),
        }
    }

    /// The negation of the formula, with double negations collapsed.
    pub fn negate(&self) -> Self {
        match self.node() {
            FormulaNode::True => Self::ff(),
            FormulaNode::False => Self::tt(),
            FormulaNode::Not(inner) => inner.clone(),
            _ => Self::wrap(FormulaNode::Not(self.clone())),
        }
    }

    /// Negation normal form: negation pushed down to the atoms.
    pub fn nnf(&self) -> Formula {
        match self.node() {
            FormulaNode::Not(inner) => match inner.node() {
                FormulaNode::True => Self::ff(),
                FormulaNode::False => Self::tt(),
                FormulaNode::Not(g) => g.nnf(),
                FormulaNode::And(fs) => Self::or(fs.iter().map(|f| f.negate().nnf()).collect()),
                FormulaNode::Or(fs) => Self::and(fs.iter().map(|f| f.negate().nnf()).collect()),
                FormulaNode::BoolVar(_) | FormulaNode::Relation(..) | FormulaNode::Forall(..) => {
                    self.clone()
                }
            },
            FormulaNode::And(fs) => Self::and(fs.iter().map(Formula::nnf).collect()),
            FormulaNode::Or(fs) => Self::or(fs.iter().map(Formula::nnf).collect()),
            _ => self.clone(),
        }
    }

    pub fn implies(antecedent: Formula, consequent: Formula) -> Self {
        Self::or(vec![antecedent.negate(), consequent])
    }

    /// A universally quantified subformula over the given bounded variables.
    pub fn forall(bounds: Vec<QuantifiedBound>, body: Formula) -> Self {
        Self::wrap(FormulaNode::Forall(bounds, body))
    }

    /// True for the formulas the boolean layer abstracts to a single variable.
    pub fn is_atom(&self) -> bool {
        matches!(
            self.node(),
            FormulaNode::Relation(..) | FormulaNode::Forall(..)
        )
    }

    /// Collects the free variables of the formula into `out`.
    ///
    /// Variables bound by a quantifier are not free in it.
    pub fn collect_free_variables(&self, out: &mut BTreeSet<Variable>) {
        match self.node() {
            FormulaNode::True | FormulaNode::False => {}
            FormulaNode::BoolVar(v) => {
                out.insert(v.clone());
            }
            FormulaNode::Relation(_, lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            FormulaNode::Not(f) => f.collect_free_variables(out),
            FormulaNode::And(fs) | FormulaNode::Or(fs) => {
                for f in fs {
                    f.collect_free_variables(out);
                }
            }
            FormulaNode::Forall(bounds, body) => {
                let mut inner = BTreeSet::new();
                body.collect_free_variables(&mut inner);
                for bound in bounds {
                    inner.remove(&bound.variable);
                }
                out.extend(inner);
            }
        }
    }

    /// The free variables of the formula, in identity order.
    pub fn free_variables(&self) -> BTreeSet<Variable> {
        let mut out = BTreeSet::new();
        self.collect_free_variables(&mut out);
        out
    }

    /// Replaces free variables bound in `assignment` with the paired expressions.
    pub fn substitute(&self, assignment: &HashMap<Variable, Expression>) -> Formula {
        match self.node() {
            FormulaNode::True | FormulaNode::False | FormulaNode::BoolVar(_) => self.clone(),
            FormulaNode::Relation(op, lhs, rhs) => Self::relation(
                *op,
                lhs.substitute(assignment),
                rhs.substitute(assignment),
            ),
            FormulaNode::Not(f) => f.substitute(assignment).negate(),
            FormulaNode::And(fs) => {
                Self::and(fs.iter().map(|f| f.substitute(assignment)).collect())
            }
            FormulaNode::Or(fs) => Self::or(fs.iter().map(|f| f.substitute(assignment)).collect()),
            FormulaNode::Forall(bounds, body) => {
                let mut shadowed = assignment.clone();
                for bound in bounds {
                    shadowed.remove(&bound.variable);
                }
                Self::forall(bounds.clone(), body.substitute(&shadowed))
            }
        }
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node) || self.node() == other.node()
    }
}

impl Eq for Formula {}

impl std::hash::Hash for Formula {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        use FormulaNode::*;
        std::mem::discriminant(self.node()).hash(state);
        match self.node() {
            True | False => {}
            BoolVar(v) => v.hash(state),
            Relation(op, lhs, rhs) => {
                op.hash(state);
                lhs.hash(state);
                rhs.hash(state);
            }
            Not(f) => f.hash(state),
            And(fs) | Or(fs) => {
                for f in fs {
                    f.hash(state);
                }
            }
            Forall(bounds, body) => {
                for bound in bounds {
                    bound.variable.hash(state);
                    bound.domain.lo().to_bits().hash(state);
                    bound.domain.hi().to_bits().hash(state);
                }
                body.hash(state);
            }
        }
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use FormulaNode::*;
        match self.node() {
            True => write!(f, "⊤"),
            False => write!(f, "⊥"),
            BoolVar(v) => write!(f, "{v}"),
            Relation(op, lhs, rhs) => {
                let symbol = match op {
                    RelationalOperator::Eq => "=",
                    RelationalOperator::Neq => "≠",
                    RelationalOperator::Leq => "≤",
                    RelationalOperator::Lt => "<",
                    RelationalOperator::Geq => "≥",
                    RelationalOperator::Gt => ">",
                };
                write!(f, "({lhs} {symbol} {rhs})")
            }
            Not(inner) => write!(f, "¬{inner}"),
            And(fs) => {
                write!(f, "(")?;
                for (i, conjunct) in fs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ∧ ")?;
                    }
                    write!(f, "{conjunct}")?;
                }
                write!(f, ")")
            }
            Or(fs) => {
                write!(f, "(")?;
                for (i, disjunct) in fs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ∨ ")?;
                    }
                    write!(f, "{disjunct}")?;
                }
                write!(f, ")")
            }
            Forall(bounds, body) => {
                write!(f, "∀")?;
                for (i, bound) in bounds.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} ∈ {}", bound.variable, bound.domain)?;
                }
                write!(f, ". {body}")
            }
        }
    }
}

#[cfg(test)]
mod formula_tests {
    use super::*;
    use crate::symbolic::VariableType;

    fn x_leq_one() -> (Variable, Formula) {
        let x = Variable::fresh("x", VariableType::Real);
        let f = Formula::leq(Expression::from(&x), Expression::constant(1.0));
        (x, f)
    }

    #[test]
    fn conjunction_simplifies_units() {
        let (_, f) = x_leq_one();

        assert_eq!(Formula::and(vec![Formula::tt(), f.clone()]), f);
        assert_eq!(Formula::and(vec![Formula::ff(), f]), Formula::ff());
        assert_eq!(Formula::and(vec![]), Formula::tt());
    }

    #[test]
    fn double_negation_collapses() {
        let (_, f) = x_leq_one();
        assert_eq!(f.negate().negate(), f);
    }

    #[test]
    fn quantified_variables_are_not_free() {
        let x = Variable::fresh("x", VariableType::Real);
        let z = Variable::fresh("z", VariableType::Real);

        let body = Formula::geq(
            Expression::from(&x) + Expression::from(&z),
            Expression::constant(0.0),
        );
        let quantified = Formula::forall(
            vec![QuantifiedBound {
                variable: z.clone(),
                domain: Interval::new(0.0, 1.0),
            }],
            body,
        );

        let free = quantified.free_variables();
        assert!(free.contains(&x));
        assert!(!free.contains(&z));
    }
}
