//! Error types.
//!
//! Storage and configuration failures are surfaced to the caller of the
//! decision engine; the caller owns the fail-open/fail-closed choice.
//! Notifier failures never escape the engine (they are logged instead).

use crate::domain::channel::Channel;
use std::path::PathBuf;
use thiserror::Error;

/// The ledger's backing store could not serve a read or write.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store is unreachable or refused the operation.
    #[error("delivery ledger unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "redis-ledger")]
    #[error("redis ledger error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Policy could not be resolved or loaded.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No configuration layer mentions the channel.
    #[error("channel `{0}` has no configured options")]
    UnknownChannel(Channel),

    /// The channel is configured but a key is unset after merging all layers.
    #[error("channel `{channel}` is missing option `{option}`")]
    MissingOption {
        channel: Channel,
        option: &'static str,
    },

    #[error("invalid whitelist pattern: {0}")]
    InvalidWhitelist(#[from] regex::Error),

    /// A value that deserialised but makes no sense (e.g. `limit = true`).
    #[error("invalid value for `{option}`: {reason}")]
    InvalidValue {
        option: &'static str,
        reason: String,
    },

    #[error("failed to parse safetynet configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read safetynet configuration from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process-wide configuration is write-once.
    #[error("process-wide safetynet configuration is already installed")]
    AlreadyInstalled,
}

/// A denial notification could not be delivered.
#[derive(Debug, Error)]
#[error("denial notification failed: {reason}")]
pub struct NotifierError {
    reason: String,
}

impl NotifierError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors returned by [`RateDecisionEngine`](crate::RateDecisionEngine) operations.
#[derive(Debug, Error)]
pub enum SafetynetError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl SafetynetError {
    /// True when the failure came from the ledger backend.
    pub fn is_storage(&self) -> bool {
        matches!(self, SafetynetError::Storage(_))
    }

    /// True when the failure came from policy resolution.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SafetynetError::Configuration(_))
    }
}
