//! Rate limiting policy and its configuration layers.
//!
//! Policy is resolved in layers, each one a typed partial record merged key
//! by key over the previous:
//!
//! 1. built-in defaults ([`PolicyLayer::builtin`])
//! 2. process-wide configuration, loaded once at startup
//! 3. the owning type's declaration ([`PolicyContextBuilder`])
//! 4. per-call overrides on a [`DeliveryAttempt`](crate::DeliveryAttempt)
//!
//! Layers 1 to 3 are folded into an immutable [`PolicyContext`] when the
//! owner is constructed. Layer 4 is applied on every evaluation by
//! [`PolicyContext::resolve`].

use crate::domain::channel::Channel;
use crate::error::ConfigurationError;
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// Whitelist applied when no layer sets one.
pub const BUILTIN_WHITELIST: &str = r"@example\.com";

/// Default window for the built-in `email` channel.
pub const BUILTIN_EMAIL_TIMEFRAME: Duration = Duration::from_secs(30 * 60);

/// Serialised form shared by [`Limit`] and [`Timeframe`]: `false` disables the
/// dimension, an integer sets it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSetting {
    Flag(bool),
    Value(u64),
}

/// Maximum number of deliveries per bucket within the timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Limit {
    /// Skip the count check; every attempt is permitted (and still recorded).
    Disabled,
    /// Permit while the count in the window is strictly below this value.
    Max(u32),
}

impl Limit {
    /// Whether `count` prior deliveries still leave room for one more.
    pub fn permits(&self, count: u64) -> bool {
        match self {
            Limit::Disabled => true,
            Limit::Max(max) => count < u64::from(*max),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Limit::Disabled)
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawSetting::deserialize(deserializer)? {
            RawSetting::Flag(false) => Ok(Limit::Disabled),
            RawSetting::Flag(true) => Err(D::Error::custom("limit must be `false` or a count")),
            RawSetting::Value(n) => u32::try_from(n)
                .map(Limit::Max)
                .map_err(|_| D::Error::custom(format!("limit {n} is out of range"))),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = match self {
            Limit::Disabled => RawSetting::Flag(false),
            Limit::Max(n) => RawSetting::Value(u64::from(*n)),
        };
        raw.serialize(serializer)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Disabled => f.write_str("unlimited"),
            Limit::Max(n) => write!(f, "{n}"),
        }
    }
}

/// Trailing window that prior deliveries are counted in.
///
/// Serialised as `false` (count all history) or a number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    /// Count every prior delivery regardless of age.
    Unbounded,
    Window(Duration),
}

impl Timeframe {
    pub fn from_secs(secs: u64) -> Self {
        Timeframe::Window(Duration::from_secs(secs))
    }

    pub fn from_mins(mins: u64) -> Self {
        Timeframe::Window(Duration::from_secs(mins.saturating_mul(60)))
    }

    /// Inclusive lower bound of the window ending at `now`.
    ///
    /// Returns `None` when every record counts: for an unbounded timeframe,
    /// and for a window reaching further back than the clock can represent.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timeframe::Unbounded => None,
            Timeframe::Window(window) => TimeDelta::from_std(*window)
                .ok()
                .and_then(|delta| now.checked_sub_signed(delta)),
        }
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawSetting::deserialize(deserializer)? {
            RawSetting::Flag(false) => Ok(Timeframe::Unbounded),
            RawSetting::Flag(true) => Err(D::Error::custom(
                "timeframe must be `false` or a number of seconds",
            )),
            RawSetting::Value(secs) => Ok(Timeframe::from_secs(secs)),
        }
    }
}

impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = match self {
            Timeframe::Unbounded => RawSetting::Flag(false),
            // Settings are whole seconds; rounding would silently change the window
            Timeframe::Window(window) if window.subsec_nanos() != 0 => {
                return Err(S::Error::custom(format!(
                    "timeframe {window:?} is not a whole number of seconds"
                )));
            }
            Timeframe::Window(window) => RawSetting::Value(window.as_secs()),
        };
        raw.serialize(serializer)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Unbounded => f.write_str("unbounded"),
            Timeframe::Window(window) if window.subsec_nanos() == 0 => {
                write!(f, "{}s", window.as_secs())
            }
            Timeframe::Window(window) => write!(f, "{window:?}"),
        }
    }
}

/// Partial per-channel options; unset keys fall through to the layer below.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Limit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
}

impl ChannelOptions {
    pub fn new(limit: Limit, timeframe: Timeframe) -> Self {
        Self {
            limit: Some(limit),
            timeframe: Some(timeframe),
        }
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    fn merge(&mut self, over: &ChannelOptions) {
        if over.limit.is_some() {
            self.limit = over.limit;
        }
        if over.timeframe.is_some() {
            self.timeframe = over.timeframe;
        }
    }
}

/// Fully resolved options for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub limit: Limit,
    pub timeframe: Timeframe,
}

/// Address pattern that bypasses rate limiting entirely.
///
/// Matching is an unanchored, case-sensitive regex search.
#[derive(Debug, Clone)]
pub struct Whitelist {
    pattern: Regex,
}

impl Whitelist {
    /// Compile a whitelist pattern.
    ///
    /// # Errors
    /// Returns `InvalidWhitelist` for a malformed regex and `InvalidValue` for
    /// an empty pattern, which would whitelist every address.
    pub fn new(pattern: &str) -> Result<Self, ConfigurationError> {
        if pattern.is_empty() {
            return Err(ConfigurationError::InvalidValue {
                option: "whitelist",
                reason: "an empty pattern would whitelist every address".to_string(),
            });
        }
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn matches(&self, address: &str) -> bool {
        self.pattern.is_match(address)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Which actions of an owner are rate limited at all.
///
/// Actions outside the filter bypass the engine and are always delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionFilter {
    #[default]
    All,
    /// Only the listed actions are watched.
    Only(BTreeSet<String>),
    /// Every action except the listed ones is watched.
    Except(BTreeSet<String>),
}

impl ActionFilter {
    pub fn only<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ActionFilter::Only(actions.into_iter().map(Into::into).collect())
    }

    pub fn except<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ActionFilter::Except(actions.into_iter().map(Into::into).collect())
    }

    /// Whether `action` is subject to rate limiting.
    pub fn watches(&self, action: &str) -> bool {
        match self {
            ActionFilter::All => true,
            ActionFilter::Only(actions) => actions.contains(action),
            ActionFilter::Except(actions) => !actions.contains(action),
        }
    }
}

/// One configuration layer: a whitelist pattern and per-channel options,
/// any of which may be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<String>,
    #[serde(default)]
    pub channels: BTreeMap<Channel, ChannelOptions>,
}

impl PolicyLayer {
    /// Built-in defaults: the `example.com` whitelist and one delivery per
    /// 30 minutes on `email`. No other channel has defaults.
    pub fn builtin() -> Self {
        Self {
            whitelist: Some(BUILTIN_WHITELIST.to_string()),
            channels: BTreeMap::from([(
                Channel::Email,
                ChannelOptions::new(Limit::Max(1), Timeframe::Window(BUILTIN_EMAIL_TIMEFRAME)),
            )]),
        }
    }

    /// Overlay `over` onto `self`, replacing only the keys `over` sets.
    pub fn merge(&mut self, over: &PolicyLayer) {
        if over.whitelist.is_some() {
            self.whitelist.clone_from(&over.whitelist);
        }
        for (channel, options) in &over.channels {
            self.channels
                .entry(channel.clone())
                .or_default()
                .merge(options);
        }
    }

    pub fn channel(&self, channel: &Channel) -> Option<&ChannelOptions> {
        self.channels.get(channel)
    }
}

/// Immutable, resolved policy held by an owning type.
///
/// # Example
/// ```
/// use safetynet::{Channel, ChannelOptions, Limit, PolicyContext, Timeframe};
///
/// let context = PolicyContext::builder(Channel::Sms)
///     .with_channel_options(
///         Channel::Sms,
///         ChannelOptions::new(Limit::Max(1), Timeframe::from_mins(5)),
///     )
///     .build()
///     .unwrap();
///
/// assert!(context.is_whitelisted("ops@example.com"));
/// let sms = context.channel_policy(&Channel::Sms).unwrap();
/// assert_eq!(sms.limit, Limit::Max(1));
/// ```
#[derive(Debug, Clone)]
pub struct PolicyContext {
    channel: Channel,
    whitelist: Whitelist,
    layer: PolicyLayer,
    action_filter: ActionFilter,
}

impl PolicyContext {
    pub fn builder(channel: Channel) -> PolicyContextBuilder {
        PolicyContextBuilder::new(channel)
    }

    /// The owner's default channel.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn is_whitelisted(&self, address: &str) -> bool {
        self.whitelist.matches(address)
    }

    pub fn action_filter(&self) -> &ActionFilter {
        &self.action_filter
    }

    /// The merged layers 1 to 3.
    pub fn layer(&self) -> &PolicyLayer {
        &self.layer
    }

    /// Resolve a channel's options without per-call overrides.
    pub fn channel_policy(&self, channel: &Channel) -> Result<ChannelPolicy, ConfigurationError> {
        self.resolve(channel, None, None)
    }

    /// Resolve limit and timeframe, preferring the per-call overrides.
    ///
    /// Configured options are only consulted for the keys that are not
    /// overridden, so a fully overridden call succeeds even on a channel no
    /// layer mentions.
    ///
    /// # Errors
    /// `UnknownChannel` if a key must come from configuration but no layer
    /// configures the channel; `MissingOption` if the channel is configured
    /// but the key is unset in every layer.
    pub fn resolve(
        &self,
        channel: &Channel,
        limit: Option<Limit>,
        timeframe: Option<Timeframe>,
    ) -> Result<ChannelPolicy, ConfigurationError> {
        if let (Some(limit), Some(timeframe)) = (limit, timeframe) {
            return Ok(ChannelPolicy { limit, timeframe });
        }

        let options = self
            .layer
            .channel(channel)
            .ok_or_else(|| ConfigurationError::UnknownChannel(channel.clone()))?;

        let limit = limit
            .or(options.limit)
            .ok_or_else(|| ConfigurationError::MissingOption {
                channel: channel.clone(),
                option: "limit",
            })?;
        let timeframe =
            timeframe
                .or(options.timeframe)
                .ok_or_else(|| ConfigurationError::MissingOption {
                    channel: channel.clone(),
                    option: "timeframe",
                })?;

        Ok(ChannelPolicy { limit, timeframe })
    }
}

/// Builder for [`PolicyContext`].
///
/// The process layer and owner layer are merged over the built-in defaults
/// at `build()` time; the whitelist pattern is compiled there too.
#[derive(Debug, Clone)]
pub struct PolicyContextBuilder {
    channel: Channel,
    process: Option<PolicyLayer>,
    owner: PolicyLayer,
    action_filter: ActionFilter,
}

impl PolicyContextBuilder {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            process: None,
            owner: PolicyLayer::default(),
            action_filter: ActionFilter::All,
        }
    }

    /// Set the process-wide layer (usually the loaded configuration file).
    pub fn with_process_layer(mut self, layer: PolicyLayer) -> Self {
        self.process = Some(layer);
        self
    }

    /// Merge a whole owner layer over what has been declared so far.
    pub fn with_owner_layer(mut self, layer: &PolicyLayer) -> Self {
        self.owner.merge(layer);
        self
    }

    pub fn with_channel_options(mut self, channel: Channel, options: ChannelOptions) -> Self {
        self.owner
            .channels
            .entry(channel)
            .or_default()
            .merge(&options);
        self
    }

    pub fn with_whitelist(mut self, pattern: impl Into<String>) -> Self {
        self.owner.whitelist = Some(pattern.into());
        self
    }

    pub fn with_action_filter(mut self, filter: ActionFilter) -> Self {
        self.action_filter = filter;
        self
    }

    /// Merge the layers and compile the whitelist.
    ///
    /// # Errors
    /// Returns a `ConfigurationError` if the effective whitelist pattern is
    /// invalid or empty.
    pub fn build(self) -> Result<PolicyContext, ConfigurationError> {
        let mut layer = PolicyLayer::builtin();
        if let Some(process) = &self.process {
            layer.merge(process);
        }
        layer.merge(&self.owner);

        let whitelist = Whitelist::new(layer.whitelist.as_deref().unwrap_or(BUILTIN_WHITELIST))?;

        Ok(PolicyContext {
            channel: self.channel,
            whitelist,
            layer,
            action_filter: self.action_filter,
        })
    }
}
