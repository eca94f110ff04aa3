//! Named bucket registry shared by both managers.
//!
//! Holds the `name -> bucket` map behind a lock plus the "default" template
//! that unknown names are provisioned from. Callers resolve scope keys with
//! no lock held, then re-check the bucket's resource kind inside the critical
//! section; a `None` from the record accessors means the bucket was swapped
//! out mid-resolution and the caller should resolve again.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use tracing::info;

use crate::bucket::ResourceBucket;
use crate::record::LimitRecord;
use crate::resource::{BucketResource, ScopeKey};

/// Bucket name that doubles as the template for unknown names.
pub(crate) const DEFAULT_BUCKET: &str = "default";

pub(crate) struct BucketStore<T> {
    /// Record flavour, for provisioning log lines.
    label: &'static str,
    buckets: RwLock<HashMap<String, ResourceBucket<T>>>,
    default_template: RwLock<ResourceBucket<T>>,
}

impl<T> BucketStore<T> {
    pub(crate) fn new(label: &'static str, default_bucket: ResourceBucket<T>) -> Self {
        Self {
            label,
            buckets: RwLock::new(HashMap::new()),
            default_template: RwLock::new(default_bucket),
        }
    }

    /// Register (or replace) a named bucket.
    ///
    /// Registering under [`DEFAULT_BUCKET`] also swaps the template future
    /// unknown names are provisioned from.
    pub(crate) fn set(&self, name: &str, bucket: ResourceBucket<T>, now: Instant) {
        if name == DEFAULT_BUCKET {
            *self.default_template.write().unwrap() = bucket.fresh_copy(now);
        }
        self.buckets.write().unwrap().insert(name.to_string(), bucket);
    }

    /// Resource kind configured for `name`, provisioning the bucket from the
    /// default template when the name is unknown.
    pub(crate) fn ensure(&self, name: &str, now: Instant) -> BucketResource {
        if let Some(bucket) = self.buckets.read().unwrap().get(name) {
            return bucket.resource();
        }

        let mut buckets = self.buckets.write().unwrap();
        let bucket = buckets.entry(name.to_string()).or_insert_with(|| {
            info!(
                bucket = name,
                "no {} bucket found for name, falling back to the default bucket", self.label
            );
            self.default_template.read().unwrap().fresh_copy(now)
        });
        bucket.resource()
    }

    /// Run `f` on the record for `key`, creating the record if needed.
    ///
    /// Returns `None` when the bucket is gone or no longer scoped by
    /// `expected`, in which case the key is stale and must be re-resolved.
    pub(crate) fn with_record<R>(
        &self,
        name: &str,
        expected: BucketResource,
        key: &ScopeKey,
        now: Instant,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let mut buckets = self.buckets.write().unwrap();
        match buckets.get_mut(name) {
            Some(bucket) if bucket.resource() == expected => {
                Some(f(bucket.record_mut(key, now)))
            }
            _ => None,
        }
    }

    /// Run `f` on the record for `key` without creating one.
    ///
    /// `f` sees `None` when no record exists for the key yet; the outer
    /// `None` still means the key is stale.
    pub(crate) fn with_peeked<R>(
        &self,
        name: &str,
        expected: BucketResource,
        key: &ScopeKey,
        f: impl FnOnce(Option<&T>) -> R,
    ) -> Option<R> {
        let buckets = self.buckets.read().unwrap();
        match buckets.get(name) {
            Some(bucket) if bucket.resource() == expected => Some(f(bucket.peek(key))),
            _ => None,
        }
    }
}

impl<T: LimitRecord> BucketStore<T> {
    /// Sweep every bucket, dropping expired records.
    pub(crate) fn cleanup(&self, now: Instant) {
        for bucket in self.buckets.write().unwrap().values_mut() {
            bucket.cleanup(now);
        }
    }
}
