/*!
Arithmetic expressions over [variables](super::Variable) and constants.

An [Expression] is a handle to an immutable node, shared by reference count.
The usual arithmetic operators are overloaded, so expressions compose as they read:

```rust
# use otter_smt::symbolic::{Expression, Variable, VariableType};
let x = Expression::from(&Variable::fresh("x", VariableType::Real));
let y = Expression::from(&Variable::fresh("y", VariableType::Real));

let e = x.clone() * x + y.sin();
```
*/

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use super::Variable;

/// A node of an expression tree.
#[derive(Debug, PartialEq)]
pub enum ExpressionNode {
    Constant(f64),
    Var(Variable),

    Neg(Expression),
    Add(Expression, Expression),
    Sub(Expression, Expression),
    Mul(Expression, Expression),
    Div(Expression, Expression),

    /// An integral power.
    Pow(Expression, i32),

    Sqrt(Expression),
    Exp(Expression),
    Log(Expression),
    Sin(Expression),
    Cos(Expression),
    Tan(Expression),
    Abs(Expression),
    Min(Expression, Expression),
    Max(Expression, Expression),
}

/// A handle to an immutable expression tree.
#[derive(Clone, Debug)]
pub struct Expression {
    node: Rc<ExpressionNode>,
}

impl Expression {
    fn wrap(node: ExpressionNode) -> Self {
        Expression {
            node: Rc::new(node),
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::wrap(ExpressionNode::Constant(value))
    }

    pub fn variable(var: &Variable) -> Self {
        Self::wrap(ExpressionNode::Var(var.clone()))
    }

    pub fn node(&self) -> &ExpressionNode {
        &self.node
    }

    pub fn pow(&self, exponent: i32) -> Self {
        Self::wrap(ExpressionNode::Pow(self.clone(), exponent))
    }

    pub fn sqrt(&self) -> Self {
        Self::wrap(ExpressionNode::Sqrt(self.clone()))
    }

    pub fn exp(&self) -> Self {
        Self::wrap(ExpressionNode::Exp(self.clone()))
    }

    pub fn log(&self) -> Self {
        Self::wrap(ExpressionNode::Log(self.clone()))
    }

    pub fn sin(&self) -> Self {
        Self::wrap(ExpressionNode::Sin(self.clone()))
    }

    pub fn cos(&self) -> Self {
        Self::wrap(ExpressionNode::Cos(self.clone()))
    }

    pub fn tan(&self) -> Self {
        Self::wrap(ExpressionNode::Tan(self.clone()))
    }

    pub fn abs(&self) -> Self {
        Self::wrap(ExpressionNode::Abs(self.clone()))
    }

    pub fn min(&self, other: &Expression) -> Self {
        Self::wrap(ExpressionNode::Min(self.clone(), other.clone()))
    }

    pub fn max(&self, other: &Expression) -> Self {
        Self::wrap(ExpressionNode::Max(self.clone(), other.clone()))
    }

    /// Collects the variables of the expression into `out`.
    pub fn collect_variables(&self, out: &mut BTreeSet<Variable>) {
        use ExpressionNode::*;
        match self.node() {
            Constant(_) => {}
            Var(v) => {
                out.insert(v.clone());
            }
            Neg(a) | Sqrt(a) | Exp(a) | Log(a) | Sin(a) | Cos(a) | Tan(a) | Abs(a) => {
                a.collect_variables(out)
            }
            Pow(a, _) => a.collect_variables(out),
            Add(a, b) | Sub(a, b) | Mul(a, b) | Div(a, b) | Min(a, b) | Max(a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
        }
    }

    /// The variables of the expression, in identity order.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    /// Replaces every variable bound in `assignment` with the paired expression.
    pub fn substitute(&self, assignment: &HashMap<Variable, Expression>) -> Expression {
        use ExpressionNode::*;
        match self.node() {
            Constant(_) => self.clone(),
            Var(v) => match assignment.get(v) {
                Some(replacement) => replacement.clone(),
                None => self.clone(),
            },
            Neg(a) => Self::wrap(Neg(a.substitute(assignment))),
            Add(a, b) => Self::wrap(Add(a.substitute(assignment), b.substitute(assignment))),
            Sub(a, b) => Self::wrap(Sub(a.substitute(assignment), b.substitute(assignment))),
            Mul(a, b) => Self::wrap(Mul(a.substitute(assignment), b.substitute(assignment))),
            Div(a, b) => Self::wrap(Div(a.substitute(assignment), b.substitute(assignment))),
            Pow(a, n) => Self::wrap(Pow(a.substitute(assignment), *n)),
            Sqrt(a) => Self::wrap(Sqrt(a.substitute(assignment))),
            Exp(a) => Self::wrap(Exp(a.substitute(assignment))),
            Log(a) => Self::wrap(Log(a.substitute(assignment))),
            Sin(a) => Self::wrap(Sin(a.substitute(assignment))),
            Cos(a) => Self::wrap(Cos(a.substitute(assignment))),
            Tan(a) => Self::wrap(Tan(a.substitute(assignment))),
            Abs(a) => Self::wrap(Abs(a.substitute(assignment))),
            Min(a, b) => Self::wrap(Min(a.substitute(assignment), b.substitute(assignment))),
            Max(a, b) => Self::wrap(Max(a.substitute(assignment), b.substitute(assignment))),
        }
    }

    /// If the expression is linear, the coefficient of each variable together with the constant term.
    ///
    /// Products are linear only when one side is constant; any other nonlinearity returns None.
    pub fn linear_form(&self) -> Option<(HashMap<Variable, f64>, f64)> {
        fn walk(
            e: &Expression,
            scale: f64,
            coefficients: &mut HashMap<Variable, f64>,
            constant: &mut f64,
        ) -> Option<()> {
            use ExpressionNode::*;
            match e.node() {
                Constant(c) => {
                    *constant += scale * c;
                    Some(())
                }
                Var(v) => {
                    *coefficients.entry(v.clone()).or_insert(0.0) += scale;
                    Some(())
                }
                Neg(a) => walk(a, -scale, coefficients, constant),
                Add(a, b) => {
                    walk(a, scale, coefficients, constant)?;
                    walk(b, scale, coefficients, constant)
                }
                Sub(a, b) => {
                    walk(a, scale, coefficients, constant)?;
                    walk(b, -scale, coefficients, constant)
                }
                Mul(a, b) => match (a.node(), b.node()) {
                    (Constant(c), _) => walk(b, scale * c, coefficients, constant),
                    (_, Constant(c)) => walk(a, scale * c, coefficients, constant),
                    _ => None,
                },
                Div(a, b) => match b.node() {
                    Constant(c) if *c != 0.0 => walk(a, scale / c, coefficients, constant),
                    _ => None,
                },
                _ => None,
            }
        }

        let mut coefficients = HashMap::new();
        let mut constant = 0.0;
        walk(self, 1.0, &mut coefficients, &mut constant)?;
        Some((coefficients, constant))
    }
}

// Structural equality, used to key the abstraction maps.
impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node) || self.node() == other.node()
    }
}

impl Eq for Expression {}

impl std::hash::Hash for Expression {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        use ExpressionNode::*;
        std::mem::discriminant(self.node()).hash(state);
        match self.node() {
            Constant(c) => c.to_bits().hash(state),
            Var(v) => v.hash(state),
            Neg(a) | Sqrt(a) | Exp(a) | Log(a) | Sin(a) | Cos(a) | Tan(a) | Abs(a) => {
                a.hash(state)
            }
            Pow(a, n) => {
                a.hash(state);
                n.hash(state);
            }
            Add(a, b) | Sub(a, b) | Mul(a, b) | Div(a, b) | Min(a, b) | Max(a, b) => {
                a.hash(state);
                b.hash(state);
            }
        }
    }
}

impl From<&Variable> for Expression {
    fn from(var: &Variable) -> Self {
        Expression::variable(var)
    }
}

impl From<Variable> for Expression {
    fn from(var: Variable) -> Self {
        Expression::variable(&var)
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::constant(value)
    }
}

impl std::ops::Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        Expression::wrap(ExpressionNode::Neg(self))
    }
}

impl std::ops::Add for Expression {
    type Output = Expression;

    fn add(self, rhs: Expression) -> Expression {
        Expression::wrap(ExpressionNode::Add(self, rhs))
    }
}

impl std::ops::Sub for Expression {
    type Output = Expression;

    fn sub(self, rhs: Expression) -> Expression {
        Expression::wrap(ExpressionNode::Sub(self, rhs))
    }
}

impl std::ops::Mul for Expression {
    type Output = Expression;

    fn mul(self, rhs: Expression) -> Expression {
        Expression::wrap(ExpressionNode::Mul(self, rhs))
    }
}

impl std::ops::Div for Expression {
    type Output = Expression;

    fn div(self, rhs: Expression) -> Expression {
        Expression::wrap(ExpressionNode::Div(self, rhs))
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ExpressionNode::*;
        match self.node() {
            Constant(c) => write!(f, "{c}"),
            Var(v) => write!(f, "{v}"),
            Neg(a) => write!(f, "-({a})"),
            Add(a, b) => write!(f, "({a} + {b})"),
            Sub(a, b) => write!(f, "({a} - {b})"),
            Mul(a, b) => write!(f, "({a} * {b})"),
            Div(a, b) => write!(f, "({a} / {b})"),
            Pow(a, n) => write!(f, "({a}^{n})"),
            Sqrt(a) => write!(f, "sqrt({a})"),
            Exp(a) => write!(f, "exp({a})"),
            Log(a) => write!(f, "log({a})"),
            Sin(a) => write!(f, "sin({a})"),
            Cos(a) => write!(f, "cos({a})"),
            Tan(a) => write!(f, "tan({a})"),
            Abs(a) => write!(f, "|{a}|"),
            Min(a, b) => write!(f, "min({a}, {b})"),
            Max(a, b) => write!(f, "max({a}, {b})"),
        }
    }
}

#[cfg(test)]
mod expression_tests {
    use super::*;
    use crate::symbolic::VariableType;

    #[test]
    fn linear_form_of_affine() {
        let x = Variable::fresh("x", VariableType::Real);
        let y = Variable::fresh("y", VariableType::Real);

        let e = Expression::constant(2.0) * Expression::from(&x) - Expression::from(&y)
            + Expression::constant(1.0);

        let (coefficients, constant) = e.linear_form().expect("affine");
        assert_eq!(coefficients.get(&x), Some(&2.0));
        assert_eq!(coefficients.get(&y), Some(&-1.0));
        assert_eq!(constant, 1.0);
    }

    #[test]
    fn products_of_variables_are_not_linear() {
        let x = Expression::from(&Variable::fresh("x", VariableType::Real));
        assert!((x.clone() * x).linear_form().is_none());
    }

    #[test]
    fn structural_equality() {
        let x = Variable::fresh("x", VariableType::Real);

        let a = Expression::from(&x).sin();
        let b = Expression::from(&x).sin();

        assert_eq!(a, b);
    }
}
