//! Error types for bucket registration, manager lifecycle, and hooks.

/// Errors raised synchronously when registering a bucket.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Limit must be positive, or the `-1` unlimited sentinel.
    #[error("limit must be greater than 0 or -1 for unlimited, got {0}")]
    InvalidLimit(i64),

    /// Cooldown windows must be non-zero.
    #[error("reset_after must be greater than 0 seconds")]
    InvalidResetAfter,
}

/// Errors from `open`/`close` on a manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// `open` was called while the GC task is running.
    #[error("manager is already running")]
    AlreadyRunning,

    /// `close` was called while the GC task is not running.
    #[error("manager is not running")]
    NotRunning,
}

/// User-facing error produced by the execution hooks.
///
/// The message is intended to be relayed to the command caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    /// Response message for the command caller.
    pub message: String,
}

impl CommandError {
    /// Create a command error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
