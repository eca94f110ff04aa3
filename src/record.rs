//! Per-scope limit records.
//!
//! A bucket owns one record per scope key: a [`Cooldown`] counting calls
//! inside a fixed window, or a [`ConcurrencyLimit`] counting in-flight calls.
//! Both treat a limit of `-1` as "disabled": every check passes and the
//! counters are never touched.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Record trait the GC sweep prunes on.
pub(crate) trait LimitRecord: Send + Sync + 'static {
    /// Whether this record holds no live state and can be dropped.
    fn has_expired(&self, now: Instant) -> bool;
}

/// Fixed-window call-count limiter for one scope key.
#[derive(Debug, Clone)]
pub struct Cooldown {
    limit: i64,
    reset_after: Duration,
    counter: u32,
    resets_at: Instant,
}

impl Cooldown {
    /// Create a fresh record.
    ///
    /// The window starts in the past, so a brand-new record is immediately
    /// expired until its first [`increment`](Self::increment).
    pub fn new(limit: i64, reset_after: Duration, now: Instant) -> Self {
        Self {
            limit,
            reset_after,
            counter: 0,
            resets_at: now,
        }
    }

    /// Count one call against the window.
    ///
    /// Starts a new window on first use or after expiry; otherwise the
    /// counter saturates at the limit.
    pub fn increment(&mut self, now: Instant) {
        if self.limit == -1 {
            return;
        }

        if self.counter == 0 || now >= self.resets_at {
            self.resets_at = now + self.reset_after;
            self.counter = 1;
        } else if i64::from(self.counter) < self.limit {
            self.counter += 1;
        }
    }

    /// The instant the caller has to wait for, if the window is depleted.
    pub fn must_wait_until(&self, now: Instant) -> Option<Instant> {
        if self.limit != -1 && i64::from(self.counter) >= self.limit && now < self.resets_at {
            Some(self.resets_at)
        } else {
            None
        }
    }

    /// Calls counted in the current window.
    pub fn counter(&self) -> u32 {
        self.counter
    }
}

impl LimitRecord for Cooldown {
    fn has_expired(&self, now: Instant) -> bool {
        now >= self.resets_at
    }
}

/// In-flight call limiter for one scope key.
///
/// The counter is a shared atomic, so clones of a record stay coupled: a
/// clone tracked by the in-flight map releases the same slot the bucket's
/// copy handed out, even if the bucket has been swept or re-registered in
/// between.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimit {
    limit: i64,
    counter: Arc<AtomicU32>,
}

impl ConcurrencyLimit {
    /// Create a fresh record with no calls in flight.
    pub fn new(limit: i64) -> Self {
        Self {
            limit,
            counter: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Try to claim one in-flight slot.
    pub fn acquire(&self) -> bool {
        // A limit of -1 means unlimited, so there's no need to keep count.
        if self.limit == -1 {
            return true;
        }

        let mut current = self.counter.load(Ordering::SeqCst);
        loop {
            if i64::from(current) >= self.limit {
                return false;
            }

            match self.counter.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Free one in-flight slot.
    ///
    /// # Panics
    ///
    /// Panics when no slot is held and the limit is not `-1`: releasing a
    /// record that was never acquired is a double-release bug in the caller.
    pub fn release(&self) {
        let mut current = self.counter.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                if self.limit == -1 {
                    return;
                }
                panic!("released a concurrency limit that was never acquired");
            }

            match self.counter.compare_exchange_weak(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Calls currently in flight.
    pub fn in_flight(&self) -> u32 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl LimitRecord for ConcurrencyLimit {
    fn has_expired(&self, _now: Instant) -> bool {
        self.counter.load(Ordering::SeqCst) == 0
    }
}
