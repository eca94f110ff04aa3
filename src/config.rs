//! Declarative bucket configuration.
//!
//! Lets deployments describe their cooldown and concurrency buckets in a
//! config file and apply the whole set to freshly created managers in one
//! call.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::manager::{ConcurrencyLimiter, CooldownManager};
use crate::resource::BucketResource;

/// One cooldown bucket entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooldownSpec {
    /// Resource the bucket is scoped by.
    pub resource: BucketResource,

    /// Calls allowed per window, `-1` for unlimited.
    pub limit: i64,

    /// Window length in seconds.
    pub reset_after_secs: f64,
}

/// One concurrency bucket entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencySpec {
    /// Resource the bucket is scoped by.
    pub resource: BucketResource,

    /// Calls allowed in flight at once, `-1` for unlimited.
    pub limit: i64,
}

/// Full bucket configuration for both managers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Cooldown buckets by name.
    #[serde(default)]
    pub cooldowns: HashMap<String, CooldownSpec>,

    /// Concurrency buckets by name.
    #[serde(default)]
    pub concurrency: HashMap<String, ConcurrencySpec>,
}

impl LimitsConfig {
    /// Register every configured cooldown bucket on `manager`.
    pub fn apply_cooldowns(&self, manager: &CooldownManager) -> Result<(), ConfigError> {
        for (name, spec) in &self.cooldowns {
            if !spec.reset_after_secs.is_finite() || spec.reset_after_secs <= 0.0 {
                return Err(ConfigError::InvalidResetAfter);
            }
            manager.set_bucket(
                name,
                spec.resource,
                spec.limit,
                Duration::from_secs_f64(spec.reset_after_secs),
            )?;
        }
        Ok(())
    }

    /// Register every configured concurrency bucket on `limiter`.
    pub fn apply_concurrency(&self, limiter: &ConcurrencyLimiter) -> Result<(), ConfigError> {
        for (name, spec) in &self.concurrency {
            limiter.set_bucket(name, spec.resource, spec.limit)?;
        }
        Ok(())
    }

    /// Register every configured bucket on both managers.
    pub fn apply(
        &self,
        cooldowns: &CooldownManager,
        concurrency: &ConcurrencyLimiter,
    ) -> Result<(), ConfigError> {
        self.apply_cooldowns(cooldowns)?;
        self.apply_concurrency(concurrency)
    }
}
