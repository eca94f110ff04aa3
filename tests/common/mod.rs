//! Shared fake execution context for the integration tests.

// Each test binary only uses a subset of the builders.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use command_limits::{
    ChannelInfo, FetchError, LimitContext, MemberInfo, RoleCacheLookup, RoleInfo, Snowflake,
};

static NEXT_INVOCATION: AtomicU64 = AtomicU64::new(1);

/// Install a test subscriber so `RUST_LOG=command_limits=debug` shows the
/// managers' log lines during a test run.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct FakeMember {
    role_ids: Vec<Snowflake>,
    cached_roles: Vec<RoleInfo>,
}

impl MemberInfo for FakeMember {
    fn role_ids(&self) -> &[Snowflake] {
        &self.role_ids
    }

    fn cached_roles(&self) -> Vec<RoleInfo> {
        self.cached_roles.clone()
    }
}

/// Builder-style context standing in for a real command invocation.
pub struct FakeContext {
    invocation: u64,
    author: Snowflake,
    channel: Snowflake,
    guild: Option<Snowflake>,
    member: Option<FakeMember>,
    cached_channel: Option<ChannelInfo>,
    channel_cache: HashMap<Snowflake, ChannelInfo>,
    role_cache: Option<HashMap<Snowflake, RoleInfo>>,
    fetched_channel: Option<ChannelInfo>,
    fetched_roles: Option<Vec<RoleInfo>>,
}

impl FakeContext {
    pub fn new(author: u64) -> Self {
        Self {
            invocation: NEXT_INVOCATION.fetch_add(1, Ordering::Relaxed),
            author: Snowflake(author),
            channel: Snowflake(1000),
            guild: Some(Snowflake(2000)),
            member: None,
            cached_channel: None,
            channel_cache: HashMap::new(),
            role_cache: None,
            fetched_channel: None,
            fetched_roles: None,
        }
    }

    pub fn in_dm(mut self) -> Self {
        self.guild = None;
        self
    }

    pub fn in_channel(mut self, channel: u64) -> Self {
        self.channel = Snowflake(channel);
        self
    }

    pub fn in_guild(mut self, guild: u64) -> Self {
        self.guild = Some(Snowflake(guild));
        self
    }

    pub fn with_member(mut self, role_ids: &[u64], cached_roles: &[(u64, i64)]) -> Self {
        self.member = Some(FakeMember {
            role_ids: role_ids.iter().copied().map(Snowflake).collect(),
            cached_roles: cached_roles
                .iter()
                .map(|&(id, position)| RoleInfo {
                    id: Snowflake(id),
                    position,
                })
                .collect(),
        });
        self
    }

    pub fn with_cached_channel(mut self, parent: Option<u64>) -> Self {
        self.cached_channel = Some(ChannelInfo {
            id: self.channel,
            parent_id: parent.map(Snowflake),
        });
        self
    }
}

#[async_trait]
impl LimitContext for FakeContext {
    fn invocation_id(&self) -> u64 {
        self.invocation
    }

    fn author_id(&self) -> Snowflake {
        self.author
    }

    fn channel_id(&self) -> Snowflake {
        self.channel
    }

    fn guild_id(&self) -> Option<Snowflake> {
        self.guild
    }

    fn member(&self) -> Option<&dyn MemberInfo> {
        self.member.as_ref().map(|m| m as &dyn MemberInfo)
    }

    fn cached_channel(&self) -> Option<ChannelInfo> {
        self.cached_channel
    }

    async fn channel_cache_get(&self, channel_id: Snowflake) -> Option<ChannelInfo> {
        self.channel_cache.get(&channel_id).copied()
    }

    async fn role_cache_get(&self, role_id: Snowflake) -> RoleCacheLookup {
        match &self.role_cache {
            Some(cache) => cache
                .get(&role_id)
                .map(|role| RoleCacheLookup::Found(*role))
                .unwrap_or(RoleCacheLookup::NotFound),
            None => RoleCacheLookup::Unavailable,
        }
    }

    async fn fetch_channel(&self) -> Result<ChannelInfo, FetchError> {
        self.fetched_channel
            .ok_or_else(|| FetchError("channel unavailable".into()))
    }

    async fn fetch_member_roles(&self) -> Result<Vec<RoleInfo>, FetchError> {
        self.fetched_roles
            .clone()
            .ok_or_else(|| FetchError("member unavailable".into()))
    }
}
