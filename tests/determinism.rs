use otter_smt::config::Config;
use otter_smt::context::Context;
use otter_smt::interval::boxes::IntervalBox;
use otter_smt::symbolic::{Expression, Formula, Variable, VariableType};

fn solve_with(config: Config, f: &Formula) -> Option<IntervalBox> {
    Context::from_config(config)
        .check_satisfiability(f)
        .expect("solver failure")
}

fn crossing_formula() -> (Variable, Variable, Formula) {
    let x = Variable::fresh("x", VariableType::Real);
    let y = Variable::fresh("y", VariableType::Real);
    let xe = Expression::from(&x);
    let ye = Expression::from(&y);

    let f = Formula::and(vec![
        Formula::geq(xe.clone(), Expression::constant(-5.0)),
        Formula::leq(xe.clone(), Expression::constant(5.0)),
        Formula::geq(ye.clone(), Expression::constant(-5.0)),
        Formula::leq(ye.clone(), Expression::constant(5.0)),
        Formula::eq(xe.clone().sin() + ye.clone(), Expression::constant(0.0)),
        Formula::eq(ye, xe),
    ]);
    (x, y, f)
}

#[test]
fn sequential_solves_repeat_exactly() {
    let (_, _, f) = crossing_formula();

    let one = solve_with(Config::default(), &f).expect("δ-sat");
    let two = solve_with(Config::default(), &f).expect("δ-sat");

    assert_eq!(one.interval_vector(), two.interval_vector());
}

#[test]
fn monte_carlo_solves_repeat_exactly_per_seed() {
    let (_, _, f) = crossing_formula();

    let config = || Config {
        use_mcts: true,
        mcts_iterations: 300,
        random_seed: 42,
        ..Config::default()
    };

    let one = solve_with(config(), &f).expect("δ-sat");
    let two = solve_with(config(), &f).expect("δ-sat");

    assert_eq!(one.interval_vector(), two.interval_vector());
}

#[test]
fn random_phase_repeats_exactly_per_seed() {
    let (_, _, f) = crossing_formula();

    let config = || Config {
        sat_default_phase: otter_smt::config::SatDefaultPhase::Random,
        random_seed: 7,
        ..Config::default()
    };

    let one = solve_with(config(), &f).expect("δ-sat");
    let two = solve_with(config(), &f).expect("δ-sat");

    assert_eq!(one.interval_vector(), two.interval_vector());
}

#[test]
fn monte_carlo_agrees_with_sequential_on_verdicts() {
    let x = Variable::fresh("x", VariableType::Real);
    let xe = Expression::from(&x);

    // Unsat either way.
    let f = Formula::and(vec![
        Formula::geq(xe.clone(), Expression::constant(0.0)),
        Formula::leq(xe.clone(), Expression::constant(1.0)),
        Formula::geq(xe, Expression::constant(2.0)),
    ]);

    let sequential = solve_with(Config::default(), &f);
    let monte_carlo = solve_with(
        Config {
            use_mcts: true,
            ..Config::default()
        },
        &f,
    );

    assert!(sequential.is_none());
    assert!(monte_carlo.is_none());
}
