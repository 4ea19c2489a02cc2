/*!
Symbolic structures --- variables, expressions, and formulas.

These are the trees a solve is asked about.
Expressions and formulas are immutable values with structural sharing: cloning is cheap, and the same subtree may appear under many parents.

# Variables

A [Variable] is a named, typed symbol with a stable identity.
Identity is by creation, not by name: two calls to [fresh](Variable::fresh) with the same name yield distinct variables.
Identities are totally ordered, and the order is the dimension order of any [box](crate::interval::boxes) built over the variables.
*/

mod expression;
pub use expression::{Expression, ExpressionNode};

mod formula;
pub use formula::{Formula, FormulaNode, QuantifiedBound, RelationalOperator};

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The type of a [Variable].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum VariableType {
    /// A boolean-valued symbol, owned by the boolean layer.
    Boolean,

    /// An integer-valued symbol, a real whose box components are tightened to integral bounds.
    Integer,

    /// A real-valued symbol.
    Real,
}

/// A named, typed symbol with a stable identity.
#[derive(Clone, Debug)]
pub struct Variable {
    id: u64,
    name: Rc<str>,
    variable_type: VariableType,
}

static FRESH_VARIABLE_ID: AtomicU64 = AtomicU64::new(0);

impl Variable {
    /// Creates a variable distinct from every variable created before it.
    pub fn fresh(name: &str, variable_type: VariableType) -> Self {
        Variable {
            id: FRESH_VARIABLE_ID.fetch_add(1, Ordering::Relaxed),
            name: Rc::from(name),
            variable_type,
        }
    }

    /// The identity of the variable.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The name given when the variable was created.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variable_type(&self) -> VariableType {
        self.variable_type
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Variable {}

impl PartialOrd for Variable {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variable {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod variable_tests {
    use super::*;

    #[test]
    fn identity_is_by_creation() {
        let a = Variable::fresh("x", VariableType::Real);
        let b = Variable::fresh("x", VariableType::Real);

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(a < b);
    }
}
