/*!
The context --- to which formulas are asserted and within which solves take place.

A [Context] owns the [configuration](crate::config), the [counters](Counters), the [bridge](crate::bridge) to the boolean backend, and the seeded source of randomness.
Asserting is implicit: [check_satisfiability](Context::check_satisfiability) asserts its formula and solves, and assertions accumulate across calls.

# The outer loop

A solve alternates the two layers until one of them settles the question:

1. The bridge is asked for a boolean model. None means *unsat* --- with the [unsat core](Context::unsat_core) lifted when tracking is on.
2. A model's theory literals become evaluators and a top-level contractor --- forward/backward leaves for each asserted atom, with the linear-relaxation and quantified refinements the configuration asks for, under a fixpoint (or worklist-fixpoint) loop.
3. An icp engine searches the box. A δ-sat box is the answer; a refutation returns the used constraints, which go back to the bridge as a blocking clause, and the loop repeats.

# Example

```rust
# use otter_smt::config::Config;
# use otter_smt::context::Context;
# use otter_smt::symbolic::{Expression, Formula, Variable, VariableType};
let mut ctx = Context::from_config(Config::default());

let x = Variable::fresh("x", VariableType::Real);
let xe = Expression::from(&x);

// x ∈ [0, 1] ∧ x ≥ 2 has no model.
let f = Formula::and(vec![
    Formula::geq(xe.clone(), Expression::constant(0.0)),
    Formula::leq(xe.clone(), Expression::constant(1.0)),
    Formula::geq(xe, Expression::constant(2.0)),
]);

assert!(ctx.check_satisfiability(&f).expect("solver failure").is_none());
```
*/

mod counters;
pub use counters::Counters;

mod solve;

use std::collections::BTreeSet;

use rand::SeedableRng;

use crate::bridge::SatBridge;
use crate::config::Config;
use crate::generic::minimal_pcg::MinimalPCG32;
use crate::interval::boxes::IntervalBox;
use crate::misc::interrupt;
use crate::symbolic::{Expression, Formula, Variable, VariableType};
use crate::types::err::ErrorKind;

/// A context for solves, configured once and asserted to incrementally.
pub struct Context {
    /// The configuration of the context.
    pub config: Config,

    /// Counters related to the context's solves.
    pub counters: Counters,

    /// The abstraction layer over the boolean backend.
    bridge: SatBridge,

    /// The non-boolean variables of every asserted formula, in identity order.
    theory_variables: BTreeSet<Variable>,

    /// The source of randomness for the Monte-Carlo engine.
    rng: MinimalPCG32,
}

impl Context {
    /// Creates a context from some given configuration.
    pub fn from_config(config: Config) -> Self {
        let bridge = SatBridge::from_config(&config);
        let rng = MinimalPCG32::from_seed(config.random_seed.to_le_bytes());
        Context {
            config,
            counters: Counters::default(),
            bridge,
            theory_variables: BTreeSet::default(),
            rng,
        }
    }

    /// Asserts `formula` and determines δ-satisfiability of everything asserted.
    ///
    /// Some box is a δ-sat witness; none is *unsat*.
    pub fn check_satisfiability(
        &mut self,
        formula: &Formula,
    ) -> Result<Option<IntervalBox>, ErrorKind> {
        self.config.validate()?;
        interrupt::clear();
        self.assert_formula(formula)?;
        self.solve_asserted()
    }

    /// Minimizes `objective` subject to `constraint`, to within the precision.
    ///
    /// Some box is a δ-optimal witness; none means the constraint is infeasible.
    pub fn minimize(
        &mut self,
        objective: &Expression,
        constraint: &Formula,
    ) -> Result<Option<IntervalBox>, ErrorKind> {
        self.config.validate()?;
        interrupt::clear();
        self.minimize_asserted(objective, constraint)
    }

    /// The unsat core of the last *unsat* answer, when tracking is enabled.
    pub fn unsat_core(&self) -> Option<&Formula> {
        self.bridge.unsat_core()
    }

    fn assert_formula(&mut self, formula: &Formula) -> Result<(), ErrorKind> {
        for variable in formula.free_variables() {
            if variable.variable_type() != VariableType::Boolean {
                self.theory_variables.insert(variable);
            }
        }
        self.bridge.add_formula(formula)
    }

    /// A box over every asserted theory variable, each component the whole line.
    ///
    /// Domains arrive as bound atoms and are carved out by the first prune.
    fn initial_box(&self) -> IntervalBox {
        IntervalBox::over(self.theory_variables.iter().cloned())
    }
}

/// Checks the satisfiability of a given formula `f` with a given precision `delta`.
///
/// Some box is a δ-sat witness; none is *unsat*.
pub fn check_satisfiability(f: &Formula, delta: f64) -> Result<Option<IntervalBox>, ErrorKind> {
    let config = Config {
        precision: delta,
        ..Config::default()
    };
    Context::from_config(config).check_satisfiability(f)
}

/// Finds a solution minimizing `objective` while satisfying `constraint`, using `delta`.
///
/// Some box is a δ-optimal witness; none means the constraint is infeasible.
pub fn minimize(
    objective: &Expression,
    constraint: &Formula,
    delta: f64,
) -> Result<Option<IntervalBox>, ErrorKind> {
    let config = Config {
        precision: delta,
        ..Config::default()
    };
    Context::from_config(config).minimize(objective, constraint)
}
