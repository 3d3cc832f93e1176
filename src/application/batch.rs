//! Multi-recipient filtering and the outbound-message hook.

use crate::application::engine::RateDecisionEngine;
use crate::application::ports::Ledger;
use crate::domain::channel::Channel;
use crate::domain::decision::DeliveryAttempt;
use crate::domain::policy::PolicyContext;
use crate::error::SafetynetError;
use tracing::debug;

/// Recipients split by decision, each side in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub permitted: Vec<String>,
    pub denied: Vec<String>,
}

impl BatchOutcome {
    /// Whether anything is left to deliver.
    pub fn should_deliver(&self) -> bool {
        !self.permitted.is_empty()
    }
}

/// A message about to leave the process.
///
/// `perform_deliveries` is the delivery-suppression flag; once false the
/// message is dropped downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipients: Vec<String>,
    pub perform_deliveries: bool,
}

impl OutboundMessage {
    pub fn new<I, S>(recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recipients: recipients.into_iter().map(Into::into).collect(),
            perform_deliveries: true,
        }
    }
}

impl<L: Ledger> RateDecisionEngine<L> {
    /// Evaluate every recipient independently on `channel`/`action`.
    ///
    /// The channel's policy is resolved once up front, so a channel with no
    /// usable options fails even when every recipient is whitelisted or the
    /// list is empty.
    ///
    /// Each permitted recipient writes its own record; each denied one
    /// produces its own notice. Processing stops at the first error, so a
    /// failed batch may have recorded a prefix of the recipients.
    pub fn filter_recipients<S: AsRef<str>>(
        &self,
        recipients: &[S],
        channel: &Channel,
        action: &str,
        context: &PolicyContext,
    ) -> Result<BatchOutcome, SafetynetError> {
        let policy = context.channel_policy(channel)?;
        let mut outcome = BatchOutcome::default();

        for recipient in recipients {
            let address = recipient.as_ref();
            let attempt = DeliveryAttempt::new(address, action)
                .on_channel(channel.clone())
                .with_limit(policy.limit)
                .with_timeframe(policy.timeframe);

            if self.evaluate(&attempt, context)?.is_permitted() {
                outcome.permitted.push(address.to_string());
            } else {
                outcome.denied.push(address.to_string());
            }
        }

        Ok(outcome)
    }

    /// Filter `message` in place before it is sent.
    ///
    /// Returns the final value of `perform_deliveries`:
    /// - already `false`: untouched, nothing evaluated
    /// - `action` outside the context's action filter: untouched, `true`
    /// - otherwise recipients are replaced by the permitted subset and the
    ///   flag is cleared if that subset is empty
    ///
    /// On error the message is left unmodified.
    pub fn check_delivery_window(
        &self,
        message: &mut OutboundMessage,
        action: &str,
        context: &PolicyContext,
    ) -> Result<bool, SafetynetError> {
        if !message.perform_deliveries {
            return Ok(false);
        }

        if !context.action_filter().watches(action) {
            debug!(action, "action not rate limited");
            self.metrics().record_bypassed();
            return Ok(true);
        }

        let outcome =
            self.filter_recipients(&message.recipients, context.channel(), action, context)?;
        let deliver = outcome.should_deliver();

        if !outcome.denied.is_empty() {
            debug!(
                action,
                denied = outcome.denied.len(),
                remaining = outcome.permitted.len(),
                "recipients removed from outbound message"
            );
        }

        message.recipients = outcome.permitted;
        message.perform_deliveries = deliver;
        Ok(deliver)
    }
}
