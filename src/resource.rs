//! Resource scoping strategies and scope-key resolution.
//!
//! A bucket is configured with a [`BucketResource`] describing which part of
//! the execution context its records are keyed on. Resolution is best-effort:
//! the parent-channel and top-role strategies walk cache tiers before
//! fetching, and a fully exhausted chain degrades to the guild or channel ID
//! rather than failing the command.

use serde::{Deserialize, Serialize};

use crate::context::{LimitContext, RoleCacheLookup, RoleInfo, Snowflake};

/// Resource target types used by cooldowns and concurrency limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketResource {
    /// A per-user bucket.
    User,

    /// A per-guild-member bucket; per-DM when executed in a DM.
    Member,

    /// A per-channel bucket.
    Channel,

    /// A per-parent-channel bucket; per-DM in DMs, per-guild for guild
    /// channels with no parent.
    ParentChannel,

    /// A per-highest-role bucket; per-DM in DMs, per-guild for members with
    /// only the everyone role.
    TopRole,

    /// A per-guild bucket; per-DM when executed in a DM.
    Guild,

    /// A single shared bucket.
    Global,
}

/// Key a bucket uses to look up the record for a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ScopeKey {
    /// Single-ID key used by the flat bucket variant.
    Flat(Snowflake),

    /// Guild-member pair used by the member bucket variant.
    Member {
        guild_id: Snowflake,
        user_id: Snowflake,
    },

    /// DM fallback for the member variant, keyed by channel.
    Dm(Snowflake),

    /// No keying at all.
    Global,
}

impl ScopeKey {
    /// Derive the scope key for `resource` from a context.
    pub(crate) async fn resolve(ctx: &dyn LimitContext, resource: BucketResource) -> Self {
        match resource {
            BucketResource::Member => match ctx.guild_id() {
                Some(guild_id) => ScopeKey::Member {
                    guild_id,
                    user_id: ctx.author_id(),
                },
                None => ScopeKey::Dm(ctx.channel_id()),
            },
            BucketResource::Global => ScopeKey::Global,
            BucketResource::User => ScopeKey::Flat(ctx.author_id()),
            BucketResource::Channel => ScopeKey::Flat(ctx.channel_id()),
            BucketResource::Guild => {
                ScopeKey::Flat(ctx.guild_id().unwrap_or_else(|| ctx.channel_id()))
            }
            BucketResource::ParentChannel => ScopeKey::Flat(parent_channel_target(ctx).await),
            BucketResource::TopRole => ScopeKey::Flat(top_role_target(ctx).await),
        }
    }
}

async fn parent_channel_target(ctx: &dyn LimitContext) -> Snowflake {
    let Some(guild_id) = ctx.guild_id() else {
        return ctx.channel_id();
    };

    if let Some(channel) = ctx.cached_channel() {
        return channel.parent_id.unwrap_or(guild_id);
    }

    if let Some(channel) = ctx.channel_cache_get(ctx.channel_id()).await {
        return channel.parent_id.unwrap_or(guild_id);
    }

    // Threads always have a parent channel.
    if let Some(thread) = ctx.thread_cache_get(ctx.channel_id()).await {
        return thread.parent_id.unwrap_or(guild_id);
    }

    match ctx.fetch_channel().await {
        Ok(channel) => channel.parent_id.unwrap_or(guild_id),
        Err(error) => {
            tracing::warn!(%error, "channel fetch failed, scoping to the guild instead");
            guild_id
        }
    }
}

async fn top_role_target(ctx: &dyn LimitContext) -> Snowflake {
    let Some(guild_id) = ctx.guild_id() else {
        return ctx.channel_id();
    };

    // Guild contexts without a member object (webhooks etc.) are assumed to
    // only hold the everyone role, as is a member with a single role ID.
    let Some(member) = ctx.member() else {
        return guild_id;
    };
    if member.role_ids().len() <= 1 {
        return guild_id;
    }

    if let Some(role_id) = highest_role(member.cached_roles()) {
        return role_id;
    }

    let mut roles = Vec::with_capacity(member.role_ids().len());
    let mut cache_usable = true;
    for &role_id in member.role_ids() {
        match ctx.role_cache_get(role_id).await {
            RoleCacheLookup::Found(role) => roles.push(role),
            RoleCacheLookup::NotFound => {}
            RoleCacheLookup::Unavailable => {
                cache_usable = false;
                break;
            }
        }
    }
    if cache_usable {
        return highest_role(roles).unwrap_or(guild_id);
    }

    match ctx.fetch_member_roles().await {
        Ok(roles) => highest_role(roles).unwrap_or(guild_id),
        Err(error) => {
            tracing::warn!(%error, "role fetch failed, scoping to the guild instead");
            guild_id
        }
    }
}

/// Highest-position role, keeping the first seen on position ties.
fn highest_role(roles: Vec<RoleInfo>) -> Option<Snowflake> {
    roles
        .into_iter()
        .reduce(|best, role| if role.position > best.position { role } else { best })
        .map(|role| role.id)
}
