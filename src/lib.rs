//! # safetynet
//!
//! Per-recipient rate limiting for outbound e-mail, SMS and any other
//! addressable channel.
//!
//! Every delivery attempt is keyed on `(address, channel, action)`. An attempt
//! is permitted when fewer than `limit` deliveries to the same key happened
//! within the trailing `timeframe`; permitted deliveries are recorded in a
//! ledger, denied ones are reported to operators. The goal is to stop a bug
//! from sending hundreds of copies of the same message to one user while
//! leaving ordinary, spaced-out traffic alone.
//!
//! ## Quick Start
//!
//! ```rust
//! use safetynet::{
//!     Channel, ChannelOptions, DeliveryAttempt, InMemoryLedger, Limit, PolicyContext,
//!     RateDecisionEngine, Timeframe,
//! };
//!
//! let engine = RateDecisionEngine::builder(InMemoryLedger::new()).build();
//!
//! // One SMS per address and action every five minutes
//! let policy = PolicyContext::builder(Channel::Sms)
//!     .with_channel_options(
//!         Channel::Sms,
//!         ChannelOptions::new(Limit::Max(1), Timeframe::from_mins(5)),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let attempt = DeliveryAttempt::new("+15550100", "send_code");
//! assert!(engine.permit_delivery(&attempt, &policy).unwrap());
//! assert!(!engine.permit_delivery(&attempt, &policy).unwrap());
//! ```
//!
//! ## Policy Layers
//!
//! Options resolve from the most specific layer that sets them:
//!
//! 1. per-call overrides on [`DeliveryAttempt`]
//! 2. the owner's declaration ([`PolicyContextBuilder`])
//! 3. process-wide configuration ([`SafetynetConfig`], loaded from TOML)
//! 4. built-in defaults: `email` limited to 1 per 30 minutes, and
//!    `@example\.com` whitelisted
//!
//! A channel with no options in any layer is a configuration error unless
//! the call overrides both limit and timeframe.
//!
//! ## Decisions
//!
//! - **Whitelisted** addresses are always permitted; nothing is read,
//!   recorded or notified.
//! - **Permitted** when the count of matching records at or after
//!   `now - timeframe` is strictly below the limit. A new record is written.
//! - **Denied** otherwise. Nothing is written and the [`DenialNotifier`] is
//!   called once with the message `"Safetynet has caught a method!"`.
//!
//! `Limit::Disabled` (`limit = false`) permits everything and
//! `Timeframe::Unbounded` (`timeframe = false`) counts all history.
//!
//! ## Outbound Messages
//!
//! [`RateDecisionEngine::check_delivery_window`] filters a multi-recipient
//! [`OutboundMessage`] in place: denied recipients are dropped (order is
//! kept), and delivery is suppressed when none remain. Actions outside the
//! owner's [`ActionFilter`] pass untouched.
//!
//! ```rust
//! use safetynet::{Channel, InMemoryLedger, OutboundMessage, PolicyContext, RateDecisionEngine};
//!
//! let engine = RateDecisionEngine::builder(InMemoryLedger::new()).build();
//! let policy = PolicyContext::builder(Channel::Email).build().unwrap();
//!
//! let mut first = OutboundMessage::new(["a@x.com"]);
//! assert!(engine.check_delivery_window(&mut first, "welcome", &policy).unwrap());
//!
//! let mut second = OutboundMessage::new(["a@x.com", "b@x.com"]);
//! assert!(engine.check_delivery_window(&mut second, "welcome", &policy).unwrap());
//! assert_eq!(second.recipients, vec!["b@x.com"]);
//! ```
//!
//! ## Errors
//!
//! Ledger failures surface as [`StorageError`] and unresolvable policy as
//! [`ConfigurationError`]; the caller decides whether to send anyway.
//! Notifier failures are logged and never change a decision.
//!
//! ## Shared Ledgers
//!
//! [`InMemoryLedger`] limits a single process. Enable the `redis-ledger`
//! feature for `RedisLedger`, which shares history across processes.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

pub mod error;

// Re-export commonly used types for convenience
pub use domain::{
    channel::Channel,
    decision::{Decision, DeliveryAttempt, DenialNotice, NotificationEnvelope, DENIAL_MESSAGE},
    policy::{
        ActionFilter, ChannelOptions, ChannelPolicy, Limit, PolicyContext, PolicyContextBuilder,
        PolicyLayer, Timeframe, Whitelist,
    },
    record::{DeliveryKey, DeliveryRecord, RecordId},
};

pub use application::{
    batch::{BatchOutcome, OutboundMessage},
    engine::{RateDecisionEngine, RateDecisionEngineBuilder},
    limitable::RateLimitable,
    metrics::{Metrics, MetricsSnapshot},
    ports::{Clock, DenialNotifier, Ledger},
};

pub use infrastructure::{
    clock::SystemClock,
    config::SafetynetConfig,
    ledger::InMemoryLedger,
    notifier::{LogNotifier, DEFAULT_NOTIFICATION_TARGET},
};

#[cfg(feature = "redis-ledger")]
pub use infrastructure::redis_ledger::{RedisLedger, RedisLedgerConfig};

pub use error::{ConfigurationError, NotifierError, SafetynetError, StorageError};
