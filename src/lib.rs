//! In-memory rate limiting for command frameworks.
//!
//! This library provides named cooldown and concurrency buckets for chat-bot
//! commands: a [`CooldownManager`] counting calls inside fixed windows and a
//! [`ConcurrencyLimiter`] capping calls in flight, both scoped per user,
//! member, channel, parent channel, top role, guild, or globally via
//! [`BucketResource`]. The [`hooks`] module wraps them in pre/post-execution
//! hooks that surface limits as user-facing errors.
//!
//! Callers describe the invocation being limited by implementing
//! [`LimitContext`]; everything else is driven from that.

mod bucket;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
pub mod manager;
pub mod record;
pub mod resource;
mod store;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{ConcurrencySpec, CooldownSpec, LimitsConfig};
pub use context::{
    ChannelInfo, FetchError, LimitContext, MemberInfo, OwnerCheck, RoleCacheLookup, RoleInfo,
    Snowflake,
};
pub use error::{CommandError, ConfigError, LifecycleError};
pub use hooks::{ConcurrencyPostExecution, ConcurrencyPreExecution, CooldownPreExecution};
pub use manager::{ConcurrencyLimiter, CooldownManager};
pub use record::{ConcurrencyLimit, Cooldown};
pub use resource::BucketResource;
