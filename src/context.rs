//! Collaborator contracts the limiters consume.
//!
//! The limiters never talk to a chat platform directly. Callers supply a
//! [`LimitContext`] describing the invocation being limited: who called, in
//! which channel and guild, and how to look up the channel/role data the
//! [`ParentChannel`](crate::BucketResource::ParentChannel) and
//! [`TopRole`](crate::BucketResource::TopRole) scopes need. Lookups go
//! through tiered caches before any remote fetch, and every method here is
//! consumed (never produced) by this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform entity identifier (user, channel, guild, role).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(pub u64);

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Channel data needed for parent-channel scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Channel ID.
    pub id: Snowflake,

    /// Parent channel ID, if the channel has one.
    pub parent_id: Option<Snowflake>,
}

/// Role data needed for top-role scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleInfo {
    /// Role ID.
    pub id: Snowflake,

    /// Position in the guild's role hierarchy (higher wins).
    pub position: i64,
}

/// Outcome of an async role-cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleCacheLookup {
    /// The cache holds this role.
    Found(RoleInfo),

    /// The cache is authoritative and the role does not exist (skip it).
    NotFound,

    /// No cache is wired up, or the cache cannot answer; the whole tier is
    /// abandoned in favour of a fetch.
    Unavailable,
}

/// A remote lookup failed.
///
/// Scope resolution treats this as a signal to degrade to a coarser scope
/// key, never as a hard error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("fetch failed: {0}")]
pub struct FetchError(pub String);

/// Guild-member data attached to a context.
pub trait MemberInfo: Send + Sync {
    /// IDs of the member's roles, including the everyone role.
    fn role_ids(&self) -> &[Snowflake];

    /// Role objects available in the process-local cache.
    ///
    /// May be empty when the roles aren't cached; resolution then falls back
    /// to the async cache and finally a fetch.
    fn cached_roles(&self) -> Vec<RoleInfo>;
}

/// Contract an execution context must satisfy to be rate limited.
///
/// Only `author_id`, `channel_id`, and `invocation_id` are mandatory; the
/// cache accessors default to "nothing cached" so minimal contexts work with
/// every scope except at reduced precision.
#[async_trait]
pub trait LimitContext: Send + Sync {
    /// Identifier unique to this command invocation.
    ///
    /// Used to deduplicate in-flight acquisitions for the same call, so it
    /// must not repeat across concurrent invocations.
    fn invocation_id(&self) -> u64;

    /// ID of the calling user.
    fn author_id(&self) -> Snowflake;

    /// ID of the channel the command was called in.
    fn channel_id(&self) -> Snowflake;

    /// ID of the guild the command was called in, `None` in DMs.
    fn guild_id(&self) -> Option<Snowflake>;

    /// Guild member data for the caller, if known.
    fn member(&self) -> Option<&dyn MemberInfo> {
        None
    }

    /// Current channel from the process-local cache.
    fn cached_channel(&self) -> Option<ChannelInfo> {
        None
    }

    /// Look up a guild channel in the async channel cache.
    async fn channel_cache_get(&self, channel_id: Snowflake) -> Option<ChannelInfo> {
        let _ = channel_id;
        None
    }

    /// Look up a thread in the async thread cache.
    async fn thread_cache_get(&self, channel_id: Snowflake) -> Option<ChannelInfo> {
        let _ = channel_id;
        None
    }

    /// Look up a role in the async role cache.
    async fn role_cache_get(&self, role_id: Snowflake) -> RoleCacheLookup {
        let _ = role_id;
        RoleCacheLookup::Unavailable
    }

    /// Fetch the current channel from the platform.
    async fn fetch_channel(&self) -> Result<ChannelInfo, FetchError>;

    /// Fetch the calling member's roles from the platform.
    async fn fetch_member_roles(&self) -> Result<Vec<RoleInfo>, FetchError>;
}

/// Dependency used by the cooldown pre-execution hook to exempt bot owners.
#[async_trait]
pub trait OwnerCheck: Send + Sync {
    /// Whether the context's author owns the bot.
    async fn check_ownership(&self, ctx: &dyn LimitContext) -> bool;
}
