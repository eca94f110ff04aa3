//! Pre- and post-execution hooks wrapping the managers.
//!
//! The hooks translate limiter outcomes into user-facing [`CommandError`]s
//! and pair concurrency acquisition with its release, so command frameworks
//! can bolt rate limiting onto a command without touching the managers
//! directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

use crate::context::{LimitContext, OwnerCheck};
use crate::error::CommandError;
use crate::manager::{ConcurrencyLimiter, CooldownManager};

type CooldownErrorFn = dyn Fn(&str, Duration) -> CommandError + Send + Sync;
type ConcurrencyErrorFn = dyn Fn(&str) -> CommandError + Send + Sync;

fn format_retry(wait: Duration) -> String {
    fn count(amount: u128, unit: &str) -> String {
        if amount == 1 {
            format!("1 {unit}")
        } else {
            format!("{amount} {unit}s")
        }
    }

    if wait >= Duration::from_secs(1) {
        count(wait.as_secs_f64().ceil() as u128, "second")
    } else {
        count(wait.as_millis().max(1), "millisecond")
    }
}

/// Pre-execution hook enforcing a cooldown bucket.
///
/// Bot owners are exempt by default; the exemption silently turns itself off
/// on first use when no owner check is supplied.
pub struct CooldownPreExecution {
    bucket_id: String,
    error: Option<Box<CooldownErrorFn>>,
    error_message: String,
    owners_exempt: AtomicBool,
}

impl CooldownPreExecution {
    /// Create a hook enforcing `bucket_id`.
    pub fn new(bucket_id: impl Into<String>) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            error: None,
            error_message: "Please wait {cooldown} before using this command again.".to_string(),
            owners_exempt: AtomicBool::new(true),
        }
    }

    /// Replace the default error with a callback receiving the bucket name
    /// and the remaining wait.
    pub fn with_error(
        mut self,
        error: impl Fn(&str, Duration) -> CommandError + Send + Sync + 'static,
    ) -> Self {
        self.error = Some(Box::new(error));
        self
    }

    /// Override the rate-limited response message.
    ///
    /// Any `{cooldown}` placeholder is replaced with the remaining wait.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// Set whether bot owners skip this cooldown.
    pub fn owners_exempt(self, exempt: bool) -> Self {
        self.owners_exempt.store(exempt, Ordering::Relaxed);
        self
    }

    /// Check the cooldown for a context, counting the call when it passes.
    pub async fn call(
        &self,
        ctx: &dyn LimitContext,
        cooldowns: &CooldownManager,
        owner_check: Option<&dyn OwnerCheck>,
    ) -> Result<(), CommandError> {
        if self.owners_exempt.load(Ordering::Relaxed) {
            match owner_check {
                Some(check) => {
                    if check.check_ownership(ctx).await {
                        return Ok(());
                    }
                }
                None => {
                    info!("owner check dependency not found, disabling owner exemption");
                    self.owners_exempt.store(false, Ordering::Relaxed);
                }
            }
        }

        match cooldowns.check_cooldown(&self.bucket_id, ctx, true).await {
            None => Ok(()),
            Some(wait_until) => {
                let wait = wait_until.saturating_duration_since(cooldowns.now());
                if let Some(error) = &self.error {
                    return Err(error(&self.bucket_id, wait));
                }
                Err(CommandError::new(
                    self.error_message.replace("{cooldown}", &format_retry(wait)),
                ))
            }
        }
    }
}

/// Pre-execution hook claiming a concurrency slot.
///
/// Pair with a [`ConcurrencyPostExecution`] for the same bucket so the slot
/// is released when the command finishes.
pub struct ConcurrencyPreExecution {
    bucket_id: String,
    error: Option<Box<ConcurrencyErrorFn>>,
    error_message: String,
}

impl ConcurrencyPreExecution {
    /// Create a hook acquiring under `bucket_id`.
    pub fn new(bucket_id: impl Into<String>) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            error: None,
            error_message: "This resource is currently busy; please try again later."
                .to_string(),
        }
    }

    /// Replace the default error with a callback receiving the bucket name.
    pub fn with_error(
        mut self,
        error: impl Fn(&str) -> CommandError + Send + Sync + 'static,
    ) -> Self {
        self.error = Some(Box::new(error));
        self
    }

    /// Override the resource-busy response message.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// Claim a slot for the context, failing the command when none is free.
    pub async fn call(
        &self,
        ctx: &dyn LimitContext,
        limiter: &ConcurrencyLimiter,
    ) -> Result<(), CommandError> {
        if limiter.try_acquire(&self.bucket_id, ctx).await {
            return Ok(());
        }

        match &self.error {
            Some(error) => Err(error(&self.bucket_id)),
            None => Err(CommandError::new(self.error_message.clone())),
        }
    }
}

/// Post-execution hook releasing the slot claimed by a
/// [`ConcurrencyPreExecution`] with the same bucket.
pub struct ConcurrencyPostExecution {
    bucket_id: String,
}

impl ConcurrencyPostExecution {
    /// Create a hook releasing `bucket_id`.
    pub fn new(bucket_id: impl Into<String>) -> Self {
        Self {
            bucket_id: bucket_id.into(),
        }
    }

    /// Release the context's slot; a no-op when nothing is held.
    pub fn call(&self, ctx: &dyn LimitContext, limiter: &ConcurrencyLimiter) {
        limiter.release(&self.bucket_id, ctx);
    }
}
