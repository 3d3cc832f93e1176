//! Opt-in trait for types that own a delivery policy.

use crate::application::batch::OutboundMessage;
use crate::application::engine::RateDecisionEngine;
use crate::application::ports::Ledger;
use crate::domain::decision::DeliveryAttempt;
use crate::domain::policy::PolicyContext;
use crate::error::SafetynetError;

/// A sender (mailer, notifier, job) with its own [`PolicyContext`].
///
/// Implementors only supply the context; the provided methods route through
/// a shared engine.
///
/// # Example
/// ```
/// use safetynet::{
///     Channel, DeliveryAttempt, InMemoryLedger, PolicyContext, RateDecisionEngine,
///     RateLimitable,
/// };
///
/// struct UserMailer {
///     policy: PolicyContext,
/// }
///
/// impl RateLimitable for UserMailer {
///     fn policy(&self) -> &PolicyContext {
///         &self.policy
///     }
/// }
///
/// let mailer = UserMailer {
///     policy: PolicyContext::builder(Channel::Email).build().unwrap(),
/// };
/// let engine = RateDecisionEngine::builder(InMemoryLedger::new()).build();
///
/// let attempt = DeliveryAttempt::new("u@x.com", "welcome");
/// assert!(mailer.permit_delivery(&engine, &attempt).unwrap());
/// assert!(!mailer.permit_delivery(&engine, &attempt).unwrap());
/// ```
pub trait RateLimitable {
    fn policy(&self) -> &PolicyContext;

    fn permit_delivery<L: Ledger>(
        &self,
        engine: &RateDecisionEngine<L>,
        attempt: &DeliveryAttempt<'_>,
    ) -> Result<bool, SafetynetError> {
        engine.permit_delivery(attempt, self.policy())
    }

    fn check_delivery_window<L: Ledger>(
        &self,
        engine: &RateDecisionEngine<L>,
        message: &mut OutboundMessage,
        action: &str,
    ) -> Result<bool, SafetynetError> {
        engine.check_delivery_window(message, action, self.policy())
    }
}
