//! Timing instrumentation for probe operations
//!
//! Wraps a single call with a monotonic clock sample on each side and
//! reports the elapsed time in whole microseconds (floor). Purely an
//! observability decorator: the wrapped call's result passes through
//! untouched.

use std::time::{Duration, Instant};

/// A call result together with how long the call took
#[derive(Debug)]
pub struct Timed<T> {
    /// The wrapped call's return value
    pub value: T,
    /// Wall time spent inside the call
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    /// Elapsed time in whole microseconds, rounded down
    #[must_use]
    pub fn elapsed_us(&self) -> u128 {
        self.elapsed.as_micros()
    }
}

/// Run one closure under the monotonic clock
pub fn time_call<T>(call: impl FnOnce() -> T) -> Timed<T> {
    let start = Instant::now();
    let value = call();
    Timed {
        value,
        elapsed: start.elapsed(),
    }
}
