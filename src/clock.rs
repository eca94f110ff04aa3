//! Clock abstraction for window arithmetic.
//!
//! The managers take a [`Clock`] so that cooldown windows can be driven
//! deterministically in tests instead of sleeping through them. Production
//! code uses [`SystemClock`]; tests use [`MockClock`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of monotonic time for the limiters.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// System clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
///
/// Starts at a fixed instant and only moves when [`MockClock::advance`] is
/// called, so window-expiry behaviour can be asserted without real delays.
#[derive(Debug)]
pub struct MockClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl MockClock {
    /// Create a mock clock anchored at `base`.
    pub fn new(base: Instant) -> Self {
        Self {
            base,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut offset = self.offset.lock().unwrap();
        *offset += delta;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}
