use otter_smt::config::Config;
use otter_smt::context::Context;
use otter_smt::symbolic::{Expression, Formula, Variable, VariableType};

fn core_context() -> Context {
    Context::from_config(Config {
        unsat_core: true,
        ..Config::default()
    })
}

#[test]
fn no_core_without_a_refutation() {
    let x = Variable::fresh("x", VariableType::Real);
    let xe = Expression::from(&x);

    let mut ctx = core_context();
    let f = Formula::leq(xe, Expression::constant(1.0));

    assert!(ctx
        .check_satisfiability(&f)
        .expect("solver failure")
        .is_some());
    assert!(ctx.unsat_core().is_none());
}

#[test]
fn theory_refutation_yields_a_core() {
    let x = Variable::fresh("x", VariableType::Real);
    let xe = Expression::from(&x);

    let mut ctx = core_context();
    let f = Formula::and(vec![
        Formula::geq(xe.clone(), Expression::constant(0.0)),
        Formula::leq(xe.clone(), Expression::constant(1.0)),
        Formula::geq(xe.clone(), Expression::constant(2.0)),
    ]);

    assert!(ctx
        .check_satisfiability(&f)
        .expect("solver failure")
        .is_none());

    // The lifted core mentions the variable the refutation turned on.
    let core = ctx.unsat_core().expect("tracking enabled");
    let mut referenced = std::collections::BTreeSet::new();
    core.collect_free_variables(&mut referenced);
    assert!(referenced.contains(&x));
}

#[test]
fn propositional_refutation_yields_a_core() {
    let p = Variable::fresh("p", VariableType::Boolean);

    let mut ctx = core_context();
    let f = Formula::and(vec![
        Formula::boolean(&p),
        Formula::boolean(&p).negate(),
    ]);

    assert!(ctx
        .check_satisfiability(&f)
        .expect("solver failure")
        .is_none());
    assert!(ctx.unsat_core().is_some());
}

#[test]
fn tracking_off_means_no_core() {
    let x = Variable::fresh("x", VariableType::Real);
    let xe = Expression::from(&x);

    let mut ctx = Context::from_config(Config::default());
    let f = Formula::and(vec![
        Formula::leq(xe.clone(), Expression::constant(0.0)),
        Formula::geq(xe, Expression::constant(1.0)),
    ]);

    assert!(ctx
        .check_satisfiability(&f)
        .expect("solver failure")
        .is_none());
    assert!(ctx.unsat_core().is_none());
}
