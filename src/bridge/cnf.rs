/*!
Tseitin conversion to clausal form.

Each boolean connective of the input is named by a fresh definitional variable, constrained to be equivalent to the connective it names.
The result is a set of clauses --- disjunctions of literals over atoms, input booleans, and the introduced names --- equisatisfiable with the input and linear in its size.

The introduced variables are reported alongside the clauses: they are part of the boolean search space but never part of a model handed back through the [bridge](super).
*/

use crate::symbolic::{Formula, FormulaNode, Variable, VariableType};

/// The clausal form of a formula.
pub struct CnfResult {
    /// Clauses: each a disjunction of literals (or a single literal).
    pub clauses: Vec<Formula>,

    /// The definitional variables introduced by the conversion.
    pub tseitin_variables: Vec<Variable>,
}

/// Converts `formula` to clausal form.
pub fn convert(formula: &Formula) -> CnfResult {
    let mut clauses = Vec::new();
    let mut tseitin_variables = Vec::new();

    match formula.node() {
        FormulaNode::True => {}
        FormulaNode::False => clauses.push(Formula::ff()),
        _ => {
            let top = define(formula, &mut clauses, &mut tseitin_variables);
            clauses.push(top);
        }
    }

    CnfResult {
        clauses,
        tseitin_variables,
    }
}

/// Returns a literal equivalent to `formula`, appending defining clauses.
fn define(formula: &Formula, clauses: &mut Vec<Formula>, aux: &mut Vec<Variable>) -> Formula {
    match formula.node() {
        // Constants fold away inside the connectives; reaching one here means
        // the formula was built without the simplifying constructors.
        FormulaNode::True => Formula::tt(),
        FormulaNode::False => Formula::ff(),

        FormulaNode::BoolVar(_) | FormulaNode::Relation(..) | FormulaNode::Forall(..) => {
            formula.clone()
        }

        FormulaNode::Not(inner) => define(inner, clauses, aux).negate(),

        FormulaNode::And(fs) => {
            let literals = fs
                .iter()
                .map(|f| define(f, clauses, aux))
                .collect::<Vec<_>>();

            let name = Variable::fresh(&format!("cnf{}", aux.len()), VariableType::Boolean);
            aux.push(name.clone());
            let name_literal = Formula::boolean(&name);

            // name → each conjunct, and the conjuncts → name.
            for literal in &literals {
                clauses.push(Formula::or(vec![name_literal.negate(), literal.clone()]));
            }
            let mut closing = literals.iter().map(Formula::negate).collect::<Vec<_>>();
            closing.push(name_literal.clone());
            clauses.push(Formula::or(closing));

            name_literal
        }

        FormulaNode::Or(fs) => {
            let literals = fs
                .iter()
                .map(|f| define(f, clauses, aux))
                .collect::<Vec<_>>();

            let name = Variable::fresh(&format!("cnf{}", aux.len()), VariableType::Boolean);
            aux.push(name.clone());
            let name_literal = Formula::boolean(&name);

            // name → some disjunct, and each disjunct → name.
            let mut opening = literals.clone();
            opening.insert(0, name_literal.negate());
            clauses.push(Formula::or(opening));
            for literal in &literals {
                clauses.push(Formula::or(vec![literal.negate(), name_literal.clone()]));
            }

            name_literal
        }
    }
}

#[cfg(test)]
mod cnf_tests {
    use super::*;
    use crate::symbolic::Expression;

    fn atoms() -> (Formula, Formula) {
        let x = Variable::fresh("x", VariableType::Real);
        let a = Formula::leq(Expression::from(&x), Expression::constant(0.0));
        let b = Formula::geq(Expression::from(&x), Expression::constant(1.0));
        (a, b)
    }

    #[test]
    fn an_atom_converts_to_itself() {
        let (a, _) = atoms();
        let result = convert(&a);

        assert_eq!(result.clauses, vec![a]);
        assert!(result.tseitin_variables.is_empty());
    }

    #[test]
    fn connectives_introduce_definitions() {
        let (a, b) = atoms();
        let conjunction = Formula::and(vec![a, b]);

        let result = convert(&conjunction);

        assert_eq!(result.tseitin_variables.len(), 1);
        // Two implications, one closure, one top-level unit.
        assert_eq!(result.clauses.len(), 4);
    }

    #[test]
    fn nested_connectives_stay_linear() {
        let (a, b) = atoms();
        let nested = Formula::or(vec![
            Formula::and(vec![a.clone(), b.clone()]),
            Formula::and(vec![a.negate(), b.negate()]),
        ]);

        let result = convert(&nested);

        assert_eq!(result.tseitin_variables.len(), 3);
        assert!(result.clauses.len() <= 12);
    }
}
