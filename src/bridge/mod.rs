/*!
The bridge between formulas and the boolean backend.

Three translations live here, with the maps that keep them aligned:

- *Clausal form*: a formula entering the bridge is [Tseitin converted](cnf), and the introduced definitional variables are remembered so they never leave through a model.
- *Predicate abstraction*: each theory atom --- an arithmetic relation or a quantified subformula --- is replaced by a fresh boolean variable, once, however many times the atom appears. The map is bidirectional and persists across push/pop frames.
- *Variable naming*: symbolic boolean variables map to backend literals and back; these maps, and the definitional set, are [scoped](crate::generic::scoped) to the incremental frames.

A [CheckSat](SatBridge::check_sat) answer is either a [model](Model) --- boolean literals and theory literals, definitional variables excluded --- or nothing, in which case an unsat core is lifted back to a formula when core tracking is on.

The theory layer talks back through [add_learned_clause](SatBridge::add_learned_clause): the atoms it used to refute an assignment return, negated and abstracted, as one blocking clause.
*/

pub mod cnf;

use std::collections::HashMap;

use crate::config::Config;
use crate::context::Counters;
use crate::generic::scoped::{ScopedMap, ScopedSet};
use crate::misc::log::targets;
use crate::sat::{SatLiteral, SatReport, SatSolver};
use crate::symbolic::{Formula, FormulaNode, Variable, VariableType};
use crate::types::err::{BackendError, ErrorKind, UnsupportedError};

/// A satisfying assignment, split by layer.
///
/// Boolean literals value the input's boolean variables; theory literals
/// assert or deny atoms. Definitional variables appear in neither.
pub struct Model {
    pub boolean_literals: Vec<(Variable, bool)>,
    pub theory_literals: Vec<(Formula, bool)>,
}

/// The abstraction and naming layer over the backend.
pub struct SatBridge {
    solver: SatSolver,

    /// Symbolic variable id → backend literal, scoped to frames.
    to_sat: ScopedMap<u64, SatLiteral>,

    /// Backend variable index → symbolic variable, scoped to frames.
    to_symbolic: ScopedMap<SatLiteral, Variable>,

    /// Ids of definitional variables, scoped to frames.
    tseitin: ScopedSet<u64>,

    /// Atom → abstraction variable; persists across frames.
    abstraction_of: HashMap<Formula, Variable>,

    /// Abstraction variable → atom; persists across frames.
    atom_of: HashMap<Variable, Formula>,

    compute_core: bool,
    unsat_core: Option<Formula>,
}

impl SatBridge {
    pub fn from_config(config: &Config) -> Self {
        SatBridge {
            solver: SatSolver::new(
                config.sat_default_phase,
                config.random_seed,
                config.unsat_core,
            ),
            to_sat: ScopedMap::default(),
            to_symbolic: ScopedMap::default(),
            tseitin: ScopedSet::default(),
            abstraction_of: HashMap::default(),
            atom_of: HashMap::default(),
            compute_core: config.unsat_core,
            unsat_core: None,
        }
    }

    /// Converts `formula` to clauses, abstracts its atoms, and asserts it.
    pub fn add_formula(&mut self, formula: &Formula) -> Result<(), ErrorKind> {
        log::debug!(target: targets::BRIDGE, "Asserting {formula}.");

        let converted = cnf::convert(formula);
        for variable in &converted.tseitin_variables {
            self.tseitin.insert(variable.id());
        }
        for clause in &converted.clauses {
            self.add_clause(clause)?;
        }
        Ok(())
    }

    /// Adds one blocking clause: the negation of every given theory literal.
    pub fn add_learned_clause(&mut self, literals: &[Formula]) -> Result<(), ErrorKind> {
        let mut clause = Vec::with_capacity(literals.len());
        for literal in literals {
            clause.push(-self.abstract_literal(literal)?);
        }
        log::debug!(target: targets::BRIDGE, "Learned clause over {} literals.", clause.len());
        self.solver.add_clause(clause);
        Ok(())
    }

    /// Opens an incremental frame.
    pub fn push(&mut self) {
        self.solver.push();
        self.to_sat.push();
        self.to_symbolic.push();
        self.tseitin.push();
    }

    /// Closes the most recent frame.
    pub fn pop(&mut self) {
        self.solver.pop();
        self.to_sat.pop();
        self.to_symbolic.pop();
        self.tseitin.pop();
        self.unsat_core = None;
    }

    /// Asks the backend for a model.
    ///
    /// None means unsatisfiable; with core tracking on, the lifted core is
    /// then available from [unsat_core](SatBridge::unsat_core).
    pub fn check_sat(&mut self, counters: &mut Counters) -> Result<Option<Model>, ErrorKind> {
        counters.check_sat_calls += 1;
        let report = {
            let _sat_timing = counters.sat_time.guard();
            self.solver.solve()
        };

        match report {
            SatReport::Satisfiable => {
                let mut model = Model {
                    boolean_literals: Vec::new(),
                    theory_literals: Vec::new(),
                };

                for index in 1..=self.solver.variable_count() {
                    let literal = index as SatLiteral;
                    let Some(value) = self.solver.value(literal) else {
                        continue;
                    };
                    let Some(variable) = self.to_symbolic.get(&literal) else {
                        // No symbolic counterpart; introduced under a frame
                        // popped since.
                        continue;
                    };

                    if let Some(atom) = self.atom_of.get(variable) {
                        model.theory_literals.push((atom.clone(), value));
                    } else if !self.tseitin.contains(&variable.id()) {
                        model.boolean_literals.push((variable.clone(), value));
                    }
                }

                log::debug!(
                    target: targets::BRIDGE,
                    "Model with {} theory literals, {} boolean literals.",
                    model.theory_literals.len(),
                    model.boolean_literals.len()
                );
                Ok(Some(model))
            }

            SatReport::Unsatisfiable => {
                if self.compute_core {
                    self.unsat_core = self.lift_core();
                }
                Ok(None)
            }

            SatReport::Unknown => Err(BackendError::Unknown.into()),
        }
    }

    /// The unsat core of the last refutation, lifted to a formula.
    pub fn unsat_core(&self) -> Option<&Formula> {
        self.unsat_core.as_ref()
    }

    fn add_clause(&mut self, clause: &Formula) -> Result<(), ErrorKind> {
        let mut literals = Vec::new();
        match clause.node() {
            FormulaNode::True => return Ok(()),
            FormulaNode::False => {}
            FormulaNode::Or(fs) => {
                for f in fs {
                    literals.push(self.abstract_literal(f)?);
                }
            }
            _ => literals.push(self.abstract_literal(clause)?),
        }
        self.solver.add_clause(literals);
        Ok(())
    }

    /// The backend literal of a formula literal, abstracting atoms on first sight.
    fn abstract_literal(&mut self, literal: &Formula) -> Result<SatLiteral, ErrorKind> {
        match literal.node() {
            FormulaNode::Not(inner) => Ok(-self.abstract_literal(inner)?),

            FormulaNode::BoolVar(variable) => Ok(self.backend_variable(&variable.clone())),

            FormulaNode::Relation(..) | FormulaNode::Forall(..) => {
                let abstraction = match self.abstraction_of.get(literal) {
                    Some(existing) => existing.clone(),
                    None => {
                        let fresh = Variable::fresh(
                            &format!("abs{}", self.abstraction_of.len()),
                            VariableType::Boolean,
                        );
                        self.abstraction_of.insert(literal.clone(), fresh.clone());
                        self.atom_of.insert(fresh.clone(), literal.clone());
                        log::trace!(target: targets::BRIDGE, "{literal} ↦ {fresh}.");
                        fresh
                    }
                };
                Ok(self.backend_variable(&abstraction))
            }

            _ => Err(UnsupportedError::NonArithmeticLiteral.into()),
        }
    }

    /// The backend literal of a symbolic boolean variable, created on first sight.
    fn backend_variable(&mut self, variable: &Variable) -> SatLiteral {
        if let Some(&literal) = self.to_sat.get(&variable.id()) {
            return literal;
        }
        let literal = self.solver.fresh_variable();
        self.to_sat.insert(variable.id(), literal);
        self.to_symbolic.insert(literal, variable.clone());
        literal
    }

    /// Lifts the backend's clausal core back through the abstraction.
    ///
    /// Literals with no symbolic counterpart are discarded; a clause made
    /// trivially true by such a literal is dropped whole; what survives is
    /// conjoined.
    fn lift_core(&self) -> Option<Formula> {
        let core = self.solver.clausal_core()?;

        let mut clauses = Vec::new();
        'clause_loop: for clause in core {
            let mut lifted = Vec::new();
            for literal in clause {
                let index = literal.abs();
                let Some(variable) = self.to_symbolic.get(&index) else {
                    if literal > 0 {
                        // A positive literal of an internal variable satisfies
                        // the clause outright.
                        continue 'clause_loop;
                    }
                    continue;
                };

                let symbolic = match self.atom_of.get(variable) {
                    Some(atom) => atom.clone(),
                    None => Formula::boolean(variable),
                };
                lifted.push(if literal > 0 {
                    symbolic
                } else {
                    symbolic.negate()
                });
            }

            if !lifted.is_empty() {
                clauses.push(Formula::or(lifted));
            }
        }

        Some(Formula::and(clauses))
    }
}

#[cfg(test)]
mod bridge_tests {
    use super::*;
    use crate::symbolic::Expression;

    fn atom(x: &Variable, bound: f64) -> Formula {
        Formula::leq(Expression::from(x), Expression::constant(bound))
    }

    #[test]
    fn atoms_round_trip_through_the_abstraction() {
        let x = Variable::fresh("x", VariableType::Real);
        let mut bridge = SatBridge::from_config(&Config::default());
        let mut counters = Counters::default();

        let a = atom(&x, 1.0);
        bridge.add_formula(&a).expect("supported");

        let model = bridge
            .check_sat(&mut counters)
            .expect("no backend failure")
            .expect("satisfiable");

        assert_eq!(model.theory_literals, vec![(a, true)]);
        assert!(model.boolean_literals.is_empty());
    }

    #[test]
    fn repeated_atoms_share_an_abstraction_variable() {
        let x = Variable::fresh("x", VariableType::Real);
        let mut bridge = SatBridge::from_config(&Config::default());

        let once = atom(&x, 1.0);
        let again = atom(&x, 1.0);
        bridge.add_formula(&once).expect("supported");
        bridge.add_formula(&again).expect("supported");

        assert_eq!(bridge.abstraction_of.len(), 1);
    }

    #[test]
    fn tseitin_variables_stay_out_of_models() {
        let x = Variable::fresh("x", VariableType::Real);
        let p = Variable::fresh("p", VariableType::Boolean);
        let mut bridge = SatBridge::from_config(&Config::default());
        let mut counters = Counters::default();

        let f = Formula::or(vec![
            Formula::boolean(&p),
            Formula::and(vec![atom(&x, 1.0), atom(&x, 2.0)]),
        ]);
        bridge.add_formula(&f).expect("supported");

        let model = bridge
            .check_sat(&mut counters)
            .expect("no backend failure")
            .expect("satisfiable");

        for (variable, _) in &model.boolean_literals {
            assert_eq!(variable, &p);
        }
    }

    #[test]
    fn blocked_assignments_are_not_repeated() {
        let x = Variable::fresh("x", VariableType::Real);
        let mut bridge = SatBridge::from_config(&Config::default());
        let mut counters = Counters::default();

        let a = atom(&x, 1.0);
        bridge.add_formula(&a).expect("supported");

        let first = bridge
            .check_sat(&mut counters)
            .expect("no backend failure")
            .expect("satisfiable");
        assert_eq!(first.theory_literals, vec![(a.clone(), true)]);

        bridge.add_learned_clause(&[a]).expect("supported");

        assert!(bridge
            .check_sat(&mut counters)
            .expect("no backend failure")
            .is_none());
    }

    #[test]
    fn cores_lift_to_the_responsible_atoms() {
        let x = Variable::fresh("x", VariableType::Real);
        let mut bridge = SatBridge::from_config(&Config {
            unsat_core: true,
            ..Config::default()
        });
        let mut counters = Counters::default();

        let a = atom(&x, 1.0);
        bridge.add_formula(&a).expect("supported");
        bridge.add_formula(&a.negate()).expect("supported");

        assert!(bridge
            .check_sat(&mut counters)
            .expect("no backend failure")
            .is_none());

        // Reversing the abstraction lands back on the atom over x.
        let core = bridge.unsat_core().expect("tracked").clone();
        let mut referenced = std::collections::BTreeSet::new();
        core.collect_free_variables(&mut referenced);

        assert!(referenced.contains(&x));
    }

    #[test]
    fn popped_frames_forget_their_assertions() {
        let x = Variable::fresh("x", VariableType::Real);
        let mut bridge = SatBridge::from_config(&Config::default());
        let mut counters = Counters::default();

        let a = atom(&x, 1.0);
        bridge.add_formula(&a).expect("supported");

        bridge.push();
        bridge.add_formula(&a.negate()).expect("supported");
        assert!(bridge
            .check_sat(&mut counters)
            .expect("no backend failure")
            .is_none());
        bridge.pop();

        assert!(bridge
            .check_sat(&mut counters)
            .expect("no backend failure")
            .is_some());
    }
}
