//! Delivery attempts, decisions and denial notices.

use crate::domain::channel::Channel;
use crate::domain::policy::{Limit, Timeframe};
use crate::domain::record::RecordId;
use serde::Serialize;

/// Message carried by every denial notice.
pub const DENIAL_MESSAGE: &str = "Safetynet has caught a method!";

/// A candidate delivery plus any per-call policy overrides.
///
/// The action name is always explicit. Unset overrides fall back to the
/// owner's [`PolicyContext`](crate::PolicyContext).
///
/// # Example
/// ```
/// use safetynet::{Channel, DeliveryAttempt, Limit, Timeframe};
///
/// let attempt = DeliveryAttempt::new("u@x.com", "send_sms")
///     .on_channel(Channel::Sms)
///     .with_limit(Limit::Max(1))
///     .with_timeframe(Timeframe::from_secs(1));
/// assert_eq!(attempt.action, "send_sms");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt<'a> {
    pub address: &'a str,
    pub action: &'a str,
    pub channel: Option<Channel>,
    pub limit: Option<Limit>,
    pub timeframe: Option<Timeframe>,
}

impl<'a> DeliveryAttempt<'a> {
    pub fn new(address: &'a str, action: &'a str) -> Self {
        Self {
            address,
            action,
            channel: None,
            limit: None,
            timeframe: None,
        }
    }

    pub fn on_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }
}

/// Outcome of a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The address matched the whitelist; nothing was read or written.
    Whitelisted,
    /// The delivery was permitted and recorded under this id.
    Permitted(RecordId),
    /// The bucket is full; a denial notice was sent.
    Denied,
}

impl Decision {
    pub fn is_permitted(&self) -> bool {
        !self.is_denied()
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Denied)
    }

    /// The ledger record written for this decision, if any.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Decision::Permitted(id) => Some(*id),
            Decision::Whitelisted | Decision::Denied => None,
        }
    }
}

/// Report handed to the denial notifier, once per denied address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialNotice {
    pub address: String,
    pub channel: Channel,
    pub action: String,
    pub limit: Limit,
    pub timeframe: Timeframe,
    pub message: &'static str,
}

impl DenialNotice {
    pub fn new(
        address: impl Into<String>,
        channel: Channel,
        action: impl Into<String>,
        limit: Limit,
        timeframe: Timeframe,
    ) -> Self {
        Self {
            address: address.into(),
            channel,
            action: action.into(),
            limit,
            timeframe,
            message: DENIAL_MESSAGE,
        }
    }

    /// Render the operator e-mail for this notice, addressed to and from
    /// `target`.
    pub fn envelope(&self, target: &str) -> NotificationEnvelope {
        NotificationEnvelope {
            from: target.to_string(),
            to: target.to_string(),
            subject: format!("[safetynet] {} denied for {}", self.action, self.address),
            body: format!(
                "{}\n\naddress: {}\nchannel: {}\naction: {}\nlimit: {}\ntimeframe: {}\n",
                self.message, self.address, self.channel, self.action, self.limit, self.timeframe
            ),
        }
    }
}

/// A rendered operator notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEnvelope {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}
