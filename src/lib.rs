/*!
A library for determining the δ-satisfiability of quantifier-free formulas over the reals, with support for transcendental functions.

otter_smt is a δ-complete decision procedure.
Given a formula 𝐅 and a precision δ > 0 the library answers either *unsat* — 𝐅 has no model — or *δ-sat* — the formula obtained by weakening every atom of 𝐅 by δ has a model.
On a δ-sat answer a product of intervals (a '[box](crate::interval::boxes)') is returned on which every atom of 𝐅 is δ-satisfied.

# Orientation

The library is designed around the core structure of a [context](crate::context).

A solve is the interaction of two layers:
- A boolean layer, in which a [bridge](crate::bridge) replaces each arithmetic atom of 𝐅 with a fresh boolean variable and hands the propositional skeleton to a conflict-driven [backend](crate::sat).
- A theory layer, in which an interval constraint propagation engine ([seq](crate::icp::seq) or [mcts](crate::icp::mcts)) searches a box for a region on which every atom asserted by the boolean layer is δ-satisfied, pruning with a [contractor](crate::contractor) built from those atoms.

The layers communicate through models and blocking clauses.
A boolean model is translated to a set of asserted atoms and passed to the theory layer.
A theory refutation is translated to the negation of the atoms [used](crate::contractor::status) while refuting, and passed back to the boolean layer as a clause.
The loop ends when the boolean layer runs out of models (*unsat*) or the theory layer accepts a box (*δ-sat*).

Useful starting points, then, may be:
- The outer loop in [context::solve](crate::context) to inspect the dynamics of a solve.
- The [contractor algebra](crate::contractor) to see how boxes are pruned, and the input/output bit protocol which schedules pruning.
- The [symbolic structures](crate::symbolic) to familiarise yourself with variables, expressions, and formulas.
- The [configuration](crate::config) to see what features are supported.

# Example

Check that x² = 2 has a solution in [−10, 10], to within δ = 0.001.

```rust
# use otter_smt::config::Config;
# use otter_smt::context::Context;
# use otter_smt::symbolic::{Expression, Formula, Variable, VariableType};
let mut ctx = Context::from_config(Config::default());

let x = Variable::fresh("x", VariableType::Real);
let xe = Expression::from(&x);

let f = Formula::and(vec![
    Formula::geq(xe.clone(), Expression::constant(-10.0)),
    Formula::leq(xe.clone(), Expression::constant(10.0)),
    Formula::eq(xe.clone() * xe.clone(), Expression::constant(2.0)),
]);

let result = ctx.check_satisfiability(&f).expect("solver failure");
let the_box = result.expect("x² = 2 is satisfiable on [-10, 10]");

let x_interval = the_box.interval_of(&x).expect("x is in the model");
let x_mid = x_interval.mid();
assert!((x_mid * x_mid - 2.0).abs() <= 0.1);
```

# Guiding principles

## δ-completeness

+ Every *unsat* answer is sound for the original formula: unsat is claimed only when interval reasoning shows some atom holds nowhere on the remaining region.
+ Every *δ-sat* answer is sound for the δ-weakening: the returned box is checked against every atom under δ-relaxed interval semantics.
+ No exactness is claimed beyond this, and none is possible for the supported class of formulas.

## Determinism

+ With a fixed [random_seed](crate::config::Config::random_seed) a solve is a pure function of its input: decisions, simulations, and branching tie-breaks all draw from a seeded [PCG](crate::generic::minimal_pcg), and iteration orders are fixed.

## Simple efficiency

+ The library is written using mostly simple Rust.
  Contractors are immutable after construction and freely shared; boxes are plain vectors of intervals; the search stacks own their boxes.
+ Known compromises are noted where they are made.

# Logs

To help diagnose issues (somewhat) detailed calls to [log!](log) are made, and a variety of targets are defined in order to help narrow output to relevant parts of the library.
As logging is only built on request, and further can be requested by level, logs are verbose.

The targets are listed in [misc::log].
*/

#![allow(clippy::collapsible_else_if)]
#![allow(clippy::single_match)]
#![allow(mixed_script_confusables)]

pub mod config;
pub mod context;

pub mod symbolic;

pub mod interval;

pub mod contractor;
pub mod evaluator;
pub mod icp;

pub mod bridge;
pub mod sat;

pub mod generic;
pub mod misc;
pub mod types;

pub use context::{check_satisfiability, minimize};
