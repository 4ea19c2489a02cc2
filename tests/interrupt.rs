//! Interrupt behaviour, kept to its own binary and a single test: the flag is
//! process-wide, and concurrent tests would race on it.

use otter_smt::config::Config;
use otter_smt::context::{Context, Counters};
use otter_smt::contractor::status::ContractorStatus;
use otter_smt::contractor::Contractor;
use otter_smt::evaluator::FormulaEvaluator;
use otter_smt::icp::seq::IcpSeq;
use otter_smt::interval::boxes::IntervalBox;
use otter_smt::interval::Interval;
use otter_smt::misc::interrupt;
use otter_smt::symbolic::{Expression, Formula, Variable, VariableType};
use otter_smt::types::err::ErrorKind;

#[test]
fn interrupts_unwind_and_entries_clear() {
    // A set flag unwinds the engine at its next poll point.
    let x = Variable::fresh("x", VariableType::Real);
    let xe = Expression::from(&x);

    let atom = Formula::eq(xe.clone() * xe.clone(), Expression::constant(2.0));
    let b = IntervalBox::new(vec![(x.clone(), Interval::new(-10.0, 10.0))]);

    let contractor = Contractor::fwd_bwd(&atom, &b).expect("usable");
    let evaluator = FormulaEvaluator::new(&atom, 0.001).expect("atom");

    let mut status = ContractorStatus::new(b);
    let mut counters = Counters::default();
    let engine = IcpSeq::with_settings(0.001, false);

    interrupt::set();
    let interrupted = engine.check_sat(
        &contractor,
        std::slice::from_ref(&evaluator),
        &mut status,
        &mut counters,
    );
    assert_eq!(interrupted, Err(ErrorKind::Interrupted));

    // The flag is still set; entry to a fresh solve clears it rather than
    // cancelling work that has not begun.
    assert!(interrupt::is_set());

    let f = Formula::and(vec![
        Formula::geq(xe.clone(), Expression::constant(0.0)),
        Formula::leq(xe, Expression::constant(1.0)),
    ]);

    let mut ctx = Context::from_config(Config::default());
    let result = ctx.check_satisfiability(&f).expect("stale flag cleared");

    assert!(result.is_some());
    assert!(!interrupt::is_set());
}
