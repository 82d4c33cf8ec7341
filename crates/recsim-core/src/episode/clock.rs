use std::cell::Cell;
use std::time::{Duration, Instant};

/// Monotonic time source used to measure episode phases.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock time relative to construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic clock that advances by a fixed step on every reading.
#[derive(Debug, Default)]
pub struct SteppingClock {
    current: Cell<Duration>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(step: Duration) -> Self {
        Self {
            current: Cell::new(Duration::ZERO),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Duration {
        let now = self.current.get() + self.step;
        self.current.set(now);
        now
    }
}
