use otter_smt::config::Config;
use otter_smt::context::Context;
use otter_smt::symbolic::{Expression, Formula, Variable, VariableType};

const DELTA: f64 = 0.001;

fn context() -> Context {
    Context::from_config(Config {
        precision: DELTA,
        ..Config::default()
    })
}

#[test]
fn paraboloid_over_a_half_plane() {
    let x = Variable::fresh("x", VariableType::Real);
    let y = Variable::fresh("y", VariableType::Real);
    let xe = Expression::from(&x);
    let ye = Expression::from(&y);

    // Minimize x² + y² subject to x, y ∈ [-10, 10] and x + y ≥ 1.
    let objective = xe.clone() * xe.clone() + ye.clone() * ye.clone();
    let constraint = Formula::and(vec![
        Formula::geq(xe.clone(), Expression::constant(-10.0)),
        Formula::leq(xe.clone(), Expression::constant(10.0)),
        Formula::geq(ye.clone(), Expression::constant(-10.0)),
        Formula::leq(ye.clone(), Expression::constant(10.0)),
        Formula::geq(xe.clone() + ye.clone(), Expression::constant(1.0)),
    ]);

    let witness = context()
        .minimize(&objective, &constraint)
        .expect("solver failure")
        .expect("feasible");

    let x_mid = witness.interval_of(&x).expect("x in model").mid();
    let y_mid = witness.interval_of(&y).expect("y in model").mid();

    // The optimum sits at (0.5, 0.5) with value 0.5.
    assert!(x_mid + y_mid >= 1.0 - 0.05, "constraint violated at witness");
    assert!(
        x_mid * x_mid + y_mid * y_mid <= 0.5 + 0.05,
        "objective {} at ({x_mid}, {y_mid}) is not δ-optimal",
        x_mid * x_mid + y_mid * y_mid
    );
}

#[test]
fn linear_objective_on_an_interval() {
    let x = Variable::fresh("x", VariableType::Real);
    let xe = Expression::from(&x);

    // Minimize x on [2, 5].
    let constraint = Formula::and(vec![
        Formula::geq(xe.clone(), Expression::constant(2.0)),
        Formula::leq(xe.clone(), Expression::constant(5.0)),
    ]);

    let witness = context()
        .minimize(&xe, &constraint)
        .expect("solver failure")
        .expect("feasible");

    let x_mid = witness.interval_of(&x).expect("x in model").mid();
    assert!((x_mid - 2.0).abs() <= 0.05, "x = {x_mid} is not near 2");
}

#[test]
fn infeasible_constraint_reports_none() {
    let x = Variable::fresh("x", VariableType::Real);
    let xe = Expression::from(&x);

    let constraint = Formula::and(vec![
        Formula::geq(xe.clone(), Expression::constant(1.0)),
        Formula::leq(xe.clone(), Expression::constant(0.0)),
    ]);

    assert!(context()
        .minimize(&xe, &constraint)
        .expect("solver failure")
        .is_none());
}
