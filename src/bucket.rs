//! Resource buckets: per-scope record maps.
//!
//! The bucket variant is decided once at construction from the configured
//! [`BucketResource`]: flat single-ID maps, the two-level member map with its
//! DM fallback, or a single global record. Records are created lazily through
//! a factory callback on first access.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::context::Snowflake;
use crate::record::LimitRecord;
use crate::resource::{BucketResource, ScopeKey};

/// Callback creating a fresh record for a scope key.
pub(crate) type RecordFactory<T> = Arc<dyn Fn(Instant) -> T + Send + Sync>;

/// A named bucket's live per-scope records plus its record factory.
pub(crate) struct ResourceBucket<T> {
    resource: BucketResource,
    make: RecordFactory<T>,
    kind: BucketKind<T>,
}

enum BucketKind<T> {
    Flat(HashMap<Snowflake, T>),
    Member {
        guilds: HashMap<Snowflake, HashMap<Snowflake, T>>,
        dm_fallback: HashMap<Snowflake, T>,
    },
    Global(T),
}

impl<T> ResourceBucket<T> {
    pub(crate) fn new(resource: BucketResource, make: RecordFactory<T>, now: Instant) -> Self {
        let kind = match resource {
            BucketResource::Member => BucketKind::Member {
                guilds: HashMap::new(),
                dm_fallback: HashMap::new(),
            },
            BucketResource::Global => BucketKind::Global(make(now)),
            _ => BucketKind::Flat(HashMap::new()),
        };
        Self {
            resource,
            make,
            kind,
        }
    }

    pub(crate) fn resource(&self) -> BucketResource {
        self.resource
    }

    /// Fresh, empty bucket with the same configuration.
    pub(crate) fn fresh_copy(&self, now: Instant) -> Self {
        Self::new(self.resource, Arc::clone(&self.make), now)
    }

    /// Get-or-create the record for a resolved scope key.
    pub(crate) fn record_mut(&mut self, key: &ScopeKey, now: Instant) -> &mut T {
        let make = Arc::clone(&self.make);
        match (&mut self.kind, key) {
            (BucketKind::Flat(map), ScopeKey::Flat(id)) => {
                map.entry(*id).or_insert_with(|| make(now))
            }
            (BucketKind::Member { guilds, .. }, ScopeKey::Member { guild_id, user_id }) => guilds
                .entry(*guild_id)
                .or_default()
                .entry(*user_id)
                .or_insert_with(|| make(now)),
            (BucketKind::Member { dm_fallback, .. }, ScopeKey::Dm(channel_id)) => {
                dm_fallback.entry(*channel_id).or_insert_with(|| make(now))
            }
            (BucketKind::Global(record), ScopeKey::Global) => record,
            _ => unreachable!("scope key resolved for a different bucket variant"),
        }
    }

    /// Record for a resolved scope key, without creating one.
    pub(crate) fn peek(&self, key: &ScopeKey) -> Option<&T> {
        match (&self.kind, key) {
            (BucketKind::Flat(map), ScopeKey::Flat(id)) => map.get(id),
            (BucketKind::Member { guilds, .. }, ScopeKey::Member { guild_id, user_id }) => {
                guilds.get(guild_id).and_then(|guild| guild.get(user_id))
            }
            (BucketKind::Member { dm_fallback, .. }, ScopeKey::Dm(channel_id)) => {
                dm_fallback.get(channel_id)
            }
            (BucketKind::Global(record), ScopeKey::Global) => Some(record),
            _ => None,
        }
    }
}

impl<T: LimitRecord> ResourceBucket<T> {
    /// Drop expired records; empty guild sub-maps never survive this call.
    pub(crate) fn cleanup(&mut self, now: Instant) {
        match &mut self.kind {
            BucketKind::Flat(map) => map.retain(|_, record| !record.has_expired(now)),
            BucketKind::Member {
                guilds,
                dm_fallback,
            } => {
                for guild in guilds.values_mut() {
                    guild.retain(|_, record| !record.has_expired(now));
                }
                guilds.retain(|_, guild| !guild.is_empty());
                dm_fallback.retain(|_, record| !record.has_expired(now));
            }
            BucketKind::Global(_) => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn record_count(&self) -> usize {
        match &self.kind {
            BucketKind::Flat(map) => map.len(),
            BucketKind::Member {
                guilds,
                dm_fallback,
            } => guilds.values().map(HashMap::len).sum::<usize>() + dm_fallback.len(),
            BucketKind::Global(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Cooldown;
    use std::time::Duration;

    fn cooldown_bucket(resource: BucketResource, limit: i64, now: Instant) -> ResourceBucket<Cooldown> {
        let make: RecordFactory<Cooldown> =
            Arc::new(move |now| Cooldown::new(limit, Duration::from_secs(10), now));
        ResourceBucket::new(resource, make, now)
    }

    #[test]
    fn test_flat_bucket_lazily_creates_per_key() {
        let now = Instant::now();
        let mut bucket = cooldown_bucket(BucketResource::User, 2, now);
        assert!(bucket.peek(&ScopeKey::Flat(Snowflake(1))).is_none());

        bucket.record_mut(&ScopeKey::Flat(Snowflake(1)), now).increment(now);
        bucket.record_mut(&ScopeKey::Flat(Snowflake(1)), now).increment(now);
        bucket.record_mut(&ScopeKey::Flat(Snowflake(2)), now).increment(now);

        assert_eq!(bucket.peek(&ScopeKey::Flat(Snowflake(1))).unwrap().counter(), 2);
        assert_eq!(bucket.peek(&ScopeKey::Flat(Snowflake(2))).unwrap().counter(), 1);
    }

    #[test]
    fn test_member_bucket_scopes_guild_user_and_dm_independently() {
        let now = Instant::now();
        let mut bucket = cooldown_bucket(BucketResource::Member, 5, now);

        let a_in_g = ScopeKey::Member {
            guild_id: Snowflake(10),
            user_id: Snowflake(1),
        };
        let b_in_g = ScopeKey::Member {
            guild_id: Snowflake(10),
            user_id: Snowflake(2),
        };
        let a_in_h = ScopeKey::Member {
            guild_id: Snowflake(11),
            user_id: Snowflake(1),
        };
        let a_dm = ScopeKey::Dm(Snowflake(99));

        bucket.record_mut(&a_in_g, now).increment(now);
        bucket.record_mut(&a_in_g, now).increment(now);
        bucket.record_mut(&b_in_g, now).increment(now);
        bucket.record_mut(&a_in_h, now).increment(now);
        bucket.record_mut(&a_dm, now).increment(now);

        assert_eq!(bucket.peek(&a_in_g).unwrap().counter(), 2);
        assert_eq!(bucket.peek(&b_in_g).unwrap().counter(), 1);
        assert_eq!(bucket.peek(&a_in_h).unwrap().counter(), 1);
        assert_eq!(bucket.peek(&a_dm).unwrap().counter(), 1);
    }

    #[test]
    fn test_cleanup_removes_only_expired_records() {
        let now = Instant::now();
        let mut bucket = cooldown_bucket(BucketResource::User, 2, now);
        bucket.record_mut(&ScopeKey::Flat(Snowflake(1)), now).increment(now);

        let later = now + Duration::from_secs(3);
        bucket.record_mut(&ScopeKey::Flat(Snowflake(2)), later).increment(later);

        // Key 1's window (10s from `now`) has lapsed, key 2's has not.
        let sweep = now + Duration::from_secs(11);
        bucket.cleanup(sweep);

        assert!(bucket.peek(&ScopeKey::Flat(Snowflake(1))).is_none());
        assert_eq!(bucket.peek(&ScopeKey::Flat(Snowflake(2))).unwrap().counter(), 1);
    }

    #[test]
    fn test_cleanup_prunes_empty_guild_maps() {
        let now = Instant::now();
        let mut bucket = cooldown_bucket(BucketResource::Member, 2, now);
        let key = ScopeKey::Member {
            guild_id: Snowflake(10),
            user_id: Snowflake(1),
        };
        bucket.record_mut(&key, now).increment(now);
        assert_eq!(bucket.record_count(), 1);

        bucket.cleanup(now + Duration::from_secs(11));
        assert_eq!(bucket.record_count(), 0);
        match &bucket.kind {
            BucketKind::Member { guilds, .. } => assert!(guilds.is_empty()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_fresh_copy_is_empty_with_same_config() {
        let now = Instant::now();
        let mut bucket = cooldown_bucket(BucketResource::User, 2, now);
        bucket.record_mut(&ScopeKey::Flat(Snowflake(1)), now).increment(now);

        let copy = bucket.fresh_copy(now);
        assert_eq!(copy.resource(), BucketResource::User);
        assert_eq!(copy.record_count(), 0);
    }

    #[test]
    fn test_global_bucket_shares_one_record() {
        let now = Instant::now();
        let mut bucket = cooldown_bucket(BucketResource::Global, 3, now);
        bucket.record_mut(&ScopeKey::Global, now).increment(now);
        bucket.record_mut(&ScopeKey::Global, now).increment(now);
        assert_eq!(bucket.peek(&ScopeKey::Global).unwrap().counter(), 2);
    }
}
