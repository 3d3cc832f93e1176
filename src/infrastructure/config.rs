//! Process-wide configuration.
//!
//! Loaded once at startup from TOML and installed into a write-once global.
//!
//! ```toml
//! notification_email = "ops@example.org"
//! whitelist = "@example\\.com"
//!
//! [channels.email]
//! limit = 1
//! timeframe = 1800
//!
//! [channels.sms]
//! limit = false
//! timeframe = false
//! ```
//!
//! `limit = false` disables the limit; `timeframe = false` counts all
//! history. Timeframes are in seconds.

use crate::domain::channel::Channel;
use crate::domain::policy::{
    ChannelOptions, Limit, PolicyContext, PolicyContextBuilder, PolicyLayer, Timeframe,
};
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

static INSTALLED: OnceLock<SafetynetConfig> = OnceLock::new();

/// The process-wide configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetynetConfig {
    /// Operator address that receives denial notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_email: Option<String>,
    #[serde(flatten)]
    pub layer: PolicyLayer,
}

impl SafetynetConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Starting point for a new application: on `email`, 1000 deliveries per
    /// hour in development, 1 per hour otherwise.
    pub fn recommended(development: bool) -> Self {
        let limit = if development { 1000 } else { 1 };
        let mut layer = PolicyLayer::default();
        layer.channels.insert(
            Channel::Email,
            ChannelOptions::new(Limit::Max(limit), Timeframe::from_mins(60)),
        );
        Self {
            notification_email: None,
            layer,
        }
    }

    pub fn policy_layer(&self) -> &PolicyLayer {
        &self.layer
    }

    /// A context builder with this configuration as its process layer.
    pub fn context_builder(&self, channel: Channel) -> PolicyContextBuilder {
        PolicyContext::builder(channel).with_config(self)
    }

    /// Install as the process-wide configuration.
    ///
    /// # Errors
    /// `AlreadyInstalled` if a configuration was installed before.
    pub fn install(self) -> Result<&'static SafetynetConfig, ConfigurationError> {
        install(self)
    }
}

impl PolicyContextBuilder {
    /// Use `config` as the process-wide layer.
    pub fn with_config(self, config: &SafetynetConfig) -> Self {
        self.with_process_layer(config.layer.clone())
    }

    /// Use the installed configuration, if any, as the process-wide layer.
    pub fn with_installed_config(self) -> Self {
        match installed() {
            Some(config) => self.with_config(config),
            None => self,
        }
    }
}

/// Store `config` for the rest of the process.
pub fn install(config: SafetynetConfig) -> Result<&'static SafetynetConfig, ConfigurationError> {
    INSTALLED
        .set(config)
        .map_err(|_| ConfigurationError::AlreadyInstalled)?;
    INSTALLED.get().ok_or(ConfigurationError::AlreadyInstalled)
}

/// The installed configuration, if [`install`] has been called.
pub fn installed() -> Option<&'static SafetynetConfig> {
    INSTALLED.get()
}
