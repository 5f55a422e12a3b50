use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

pub use kurbo::{Point, Size};

/// Monotonic time source in milliseconds.
///
/// The configurator never sleeps; it reads the clock whenever an operation or a
/// [`crate::Configurator::tick`] needs "now".
pub trait Clock {
    /// Current monotonic time in milliseconds.
    fn now_ms(&self) -> f64;
}

/// Wall clock backed by [`Instant`], anchored at construction.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose zero is "now".
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Manually advanced clock.
///
/// Clones share the same time cell, so a test (or a simulation loop) can keep a
/// handle while the configurator owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    /// Create a clock starting at `start_ms`.
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    /// Jump to an absolute time. Going backwards is ignored.
    pub fn set(&self, now_ms: f64) {
        if now_ms > self.now.get() {
            self.now.set(now_ms);
        }
    }

    /// Advance by `delta_ms`.
    pub fn advance(&self, delta_ms: f64) {
        self.set(self.now.get() + delta_ms.max(0.0));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}
