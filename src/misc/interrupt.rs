/*!
The process-wide interrupt flag.

A single atomic boolean, intended to be set from an asynchronous handler (e.g. on Ctrl-C) while a solve is in progress.

The flag is sampled at two kinds of poll point:
- Each iteration of a [fixpoint contractor](crate::contractor).
- Each box popped by an [icp](crate::icp) engine.

When the flag is observed set the current solve unwinds with [ErrorKind::Interrupted](crate::types::err::ErrorKind::Interrupted), releasing all owned state on the way.
The flag is cleared on entry to a solve, and never consulted while structures are merely being built.
*/

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Requests an interrupt of any solve in progress.
///
/// Safe to call from a signal handler.
pub fn set() {
    INTERRUPTED.store(true, Ordering::Release);
}

/// Clears the interrupt flag.
///
/// Called by the solver on entry, so a request made after one solve returns does not spill into the next.
pub fn clear() {
    INTERRUPTED.store(false, Ordering::Release);
}

/// True if an interrupt has been requested and not yet cleared.
pub fn is_set() -> bool {
    INTERRUPTED.load(Ordering::Acquire)
}
