//! In-memory cooldown and concurrency managers.
//!
//! Both managers keep their named buckets in a [`BucketStore`] and share the
//! same shape: synchronous bucket registration that validates eagerly, an
//! async check path that resolves the scope key with no lock held, and a
//! background task sweeping expired records every ten seconds while the
//! manager is open.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::bucket::{RecordFactory, ResourceBucket};
use crate::clock::{Clock, SystemClock};
use crate::error::{ConfigError, LifecycleError};
use crate::context::LimitContext;
use crate::record::{ConcurrencyLimit, Cooldown, LimitRecord};
use crate::resource::{BucketResource, ScopeKey};
use crate::store::BucketStore;

const GC_INTERVAL: Duration = Duration::from_secs(10);

fn validate_limit(limit: i64) -> Result<(), ConfigError> {
    if limit > 0 || limit == -1 {
        Ok(())
    } else {
        Err(ConfigError::InvalidLimit(limit))
    }
}

fn spawn_gc<T: LimitRecord>(store: Arc<BucketStore<T>>, clock: Arc<dyn Clock>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(GC_INTERVAL).await;
            debug!("sweeping expired limit records");
            store.cleanup(clock.now());
        }
    })
}

/// In-memory manager of per-bucket command cooldowns.
///
/// Starts with a `"default"` bucket limiting each user to 2 calls per 5
/// seconds; unknown bucket names are provisioned from whatever the
/// `"default"` bucket is configured as.
pub struct CooldownManager {
    store: Arc<BucketStore<Cooldown>>,
    clock: Arc<dyn Clock>,
    gc_task: Mutex<Option<JoinHandle<()>>>,
}

fn cooldown_bucket(
    resource: BucketResource,
    limit: i64,
    reset_after: Duration,
    now: Instant,
) -> ResourceBucket<Cooldown> {
    let make: RecordFactory<Cooldown> =
        Arc::new(move |now| Cooldown::new(limit, reset_after, now));
    ResourceBucket::new(resource, make, now)
}

impl CooldownManager {
    /// Create a manager using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a manager driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let default = cooldown_bucket(
            BucketResource::User,
            2,
            Duration::from_secs(5),
            clock.now(),
        );
        Self {
            store: Arc::new(BucketStore::new("cooldown", default)),
            clock,
            gc_task: Mutex::new(None),
        }
    }

    /// Register a cooldown bucket, replacing any previous bucket and its
    /// tracked calls under the same name.
    ///
    /// `limit` must be positive or `-1` for no limit, and `reset_after` must
    /// be non-zero. Returns `&Self` so registrations can be chained.
    pub fn set_bucket(
        &self,
        name: &str,
        resource: BucketResource,
        limit: i64,
        reset_after: Duration,
    ) -> Result<&Self, ConfigError> {
        validate_limit(limit)?;
        if reset_after.is_zero() {
            return Err(ConfigError::InvalidResetAfter);
        }

        let now = self.clock.now();
        self.store
            .set(name, cooldown_bucket(resource, limit, reset_after, now), now);
        Ok(self)
    }

    /// Register a bucket that never limits anything.
    pub fn disable_bucket(&self, name: &str) -> &Self {
        let now = self.clock.now();
        self.store.set(
            name,
            cooldown_bucket(BucketResource::Global, -1, Duration::ZERO, now),
            now,
        );
        self
    }

    /// Check whether a context is rate limited under `name`.
    ///
    /// Returns the instant the caller must wait for when the window is
    /// depleted, `None` when the call may proceed. With `increment` set the
    /// passing call is counted against the window; without it this only
    /// peeks and never allocates a record.
    pub async fn check_cooldown(
        &self,
        name: &str,
        ctx: &dyn LimitContext,
        increment: bool,
    ) -> Option<Instant> {
        loop {
            let resource = self.store.ensure(name, self.clock.now());
            let key = ScopeKey::resolve(ctx, resource).await;
            let now = self.clock.now();

            let outcome = if increment {
                self.store.with_record(name, resource, &key, now, |record| {
                    let wait = record.must_wait_until(now);
                    if wait.is_none() {
                        record.increment(now);
                    }
                    wait
                })
            } else {
                self.store.with_peeked(name, resource, &key, |record| {
                    record.and_then(|r| r.must_wait_until(now))
                })
            };

            match outcome {
                Some(wait) => return wait,
                // Bucket re-registered with another scope while the key was
                // being resolved; the key is stale.
                None => continue,
            }
        }
    }

    /// Start the background sweep of expired records.
    pub fn open(&self) -> Result<(), LifecycleError> {
        let mut task = self.gc_task.lock().unwrap();
        if task.is_some() {
            return Err(LifecycleError::AlreadyRunning);
        }

        *task = Some(spawn_gc(Arc::clone(&self.store), Arc::clone(&self.clock)));
        debug!("cooldown manager opened");
        Ok(())
    }

    /// Stop the background sweep.
    pub fn close(&self) -> Result<(), LifecycleError> {
        let mut task = self.gc_task.lock().unwrap();
        match task.take() {
            Some(handle) => {
                handle.abort();
                debug!("cooldown manager closed");
                Ok(())
            }
            None => Err(LifecycleError::NotRunning),
        }
    }

    pub(crate) fn now(&self) -> Instant {
        self.clock.now()
    }
}

impl Default for CooldownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CooldownManager {
    fn drop(&mut self) {
        if let Ok(mut task) = self.gc_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

/// In-memory manager of per-bucket concurrency limits.
///
/// Starts with a `"default"` bucket allowing each user 1 call in flight at a
/// time; unknown bucket names are provisioned from whatever the `"default"`
/// bucket is configured as.
pub struct ConcurrencyLimiter {
    store: Arc<BucketStore<ConcurrencyLimit>>,
    /// Records held by live invocations, keyed by bucket name and
    /// invocation ID. Holding the record (not just the key) keeps release
    /// coupled to the exact counter that was acquired, even if the bucket
    /// has been swept or re-registered since.
    acquiring: Mutex<HashMap<(String, u64), ConcurrencyLimit>>,
    clock: Arc<dyn Clock>,
    gc_task: Mutex<Option<JoinHandle<()>>>,
}

fn concurrency_bucket(
    resource: BucketResource,
    limit: i64,
    now: Instant,
) -> ResourceBucket<ConcurrencyLimit> {
    let make: RecordFactory<ConcurrencyLimit> = Arc::new(move |_| ConcurrencyLimit::new(limit));
    ResourceBucket::new(resource, make, now)
}

impl ConcurrencyLimiter {
    /// Create a limiter using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a limiter driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let default = concurrency_bucket(BucketResource::User, 1, clock.now());
        Self {
            store: Arc::new(BucketStore::new("concurrency", default)),
            acquiring: Mutex::new(HashMap::new()),
            clock,
            gc_task: Mutex::new(None),
        }
    }

    /// Register a concurrency bucket, replacing any previous bucket under
    /// the same name.
    ///
    /// `limit` must be positive or `-1` for no limit. Returns `&Self` so
    /// registrations can be chained.
    pub fn set_bucket(
        &self,
        name: &str,
        resource: BucketResource,
        limit: i64,
    ) -> Result<&Self, ConfigError> {
        validate_limit(limit)?;
        let now = self.clock.now();
        self.store.set(name, concurrency_bucket(resource, limit, now), now);
        Ok(self)
    }

    /// Register a bucket that never limits anything.
    pub fn disable_bucket(&self, name: &str) -> &Self {
        let now = self.clock.now();
        self.store
            .set(name, concurrency_bucket(BucketResource::Global, -1, now), now);
        self
    }

    /// Try to claim an in-flight slot under `name` for this invocation.
    ///
    /// Returns whether the slot was claimed. Re-acquiring for an invocation
    /// that already holds a slot is a no-op returning `true`.
    pub async fn try_acquire(&self, name: &str, ctx: &dyn LimitContext) -> bool {
        let held = (name.to_string(), ctx.invocation_id());
        if self.acquiring.lock().unwrap().contains_key(&held) {
            return true;
        }

        loop {
            let resource = self.store.ensure(name, self.clock.now());
            let key = ScopeKey::resolve(ctx, resource).await;
            let now = self.clock.now();

            // The slot is claimed inside the store's critical section: a GC
            // sweep can otherwise prune the still-idle record between lookup
            // and acquire, and a competing invocation would be admitted on a
            // fresh record alongside this one.
            let Some(acquired) = self.store.with_record(name, resource, &key, now, |record| {
                record.acquire().then(|| record.clone())
            }) else {
                // Stale scope key, resolve again.
                continue;
            };

            return match acquired {
                Some(record) => {
                    self.acquiring.lock().unwrap().insert(held, record);
                    true
                }
                None => false,
            };
        }
    }

    /// Release the slot held under `name` for this invocation.
    ///
    /// A release without a matching acquisition is ignored.
    pub fn release(&self, name: &str, ctx: &dyn LimitContext) {
        let held = (name.to_string(), ctx.invocation_id());
        if let Some(record) = self.acquiring.lock().unwrap().remove(&held) {
            record.release();
        }
    }

    /// Start the background sweep of idle records.
    pub fn open(&self) -> Result<(), LifecycleError> {
        let mut task = self.gc_task.lock().unwrap();
        if task.is_some() {
            return Err(LifecycleError::AlreadyRunning);
        }

        *task = Some(spawn_gc(Arc::clone(&self.store), Arc::clone(&self.clock)));
        debug!("concurrency limiter opened");
        Ok(())
    }

    /// Stop the background sweep.
    pub fn close(&self) -> Result<(), LifecycleError> {
        let mut task = self.gc_task.lock().unwrap();
        match task.take() {
            Some(handle) => {
                handle.abort();
                debug!("concurrency limiter closed");
                Ok(())
            }
            None => Err(LifecycleError::NotRunning),
        }
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConcurrencyLimiter {
    fn drop(&mut self) {
        if let Ok(mut task) = self.gc_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}
