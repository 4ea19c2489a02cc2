/*!
Accumulating timers for statistics.

A [Timer] accumulates time across multiple measured regions.
A region is measured by holding a [TimerGuard], which adds the elapsed time back to the timer when dropped.
As the addition happens on drop, time is accounted for on every exit path --- including an unwind through the [Interrupted](crate::types::err::ErrorKind::Interrupted) error.
*/

use std::time::{Duration, Instant};

/// An accumulating timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Timer {
    /// Total time recorded by guards of this timer.
    pub total: Duration,
}

impl Timer {
    /// Starts measuring a region, to end when the returned guard is dropped.
    pub fn guard(&mut self) -> TimerGuard<'_> {
        TimerGuard {
            timer: self,
            start: Instant::now(),
        }
    }

    /// The accumulated time, in seconds.
    pub fn seconds(&self) -> f64 {
        self.total.as_secs_f64()
    }
}

/// Measures the region from its creation to its drop.
pub struct TimerGuard<'t> {
    timer: &'t mut Timer,
    start: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.total += self.start.elapsed();
    }
}

#[cfg(test)]
mod timer_tests {
    use super::*;

    #[test]
    fn accumulates_on_early_return() {
        let mut timer = Timer::default();

        let inner = |t: &mut Timer| -> Result<(), ()> {
            let _guard = t.guard();
            Err(())
        };

        assert!(inner(&mut timer).is_err());
        let first = timer.total;

        {
            let _guard = timer.guard();
        }

        assert!(timer.total >= first);
    }
}
