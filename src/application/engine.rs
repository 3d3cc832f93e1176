//! Rate decision engine.
//!
//! Decides whether a delivery to an `(address, channel, action)` bucket is
//! permitted, records permitted deliveries in the ledger and reports denials
//! to the notifier.

use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, DenialNotifier, Ledger};
use crate::domain::decision::{Decision, DeliveryAttempt, DenialNotice};
use crate::domain::policy::PolicyContext;
use crate::domain::record::DeliveryKey;
use crate::error::SafetynetError;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::notifier::LogNotifier;
use std::panic;
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// Evaluates delivery attempts against a [`PolicyContext`].
///
/// The engine holds no policy state of its own; every call passes the
/// owner's context explicitly.
///
/// # Concurrency
///
/// Counting and recording are two separate ledger operations. Two
/// concurrent evaluations of the *same* bucket may both observe the
/// pre-increment count and both be permitted, exceeding the limit by one.
/// Evaluations of different buckets never interfere.
#[derive(Debug, Clone)]
pub struct RateDecisionEngine<L: Ledger> {
    ledger: L,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn DenialNotifier>,
    metrics: Metrics,
}

impl<L: Ledger> RateDecisionEngine<L> {
    pub fn new(ledger: L, clock: Arc<dyn Clock>, notifier: Arc<dyn DenialNotifier>) -> Self {
        Self {
            ledger,
            clock,
            notifier,
            metrics: Metrics::new(),
        }
    }

    /// Start a builder using the system clock and a [`LogNotifier`].
    pub fn builder(ledger: L) -> RateDecisionEngineBuilder<L> {
        RateDecisionEngineBuilder {
            ledger,
            clock: None,
            notifier: None,
            metrics: None,
        }
    }

    /// Decide whether `attempt` may be delivered.
    ///
    /// 1. A whitelisted address is permitted with no ledger access and no
    ///    notification.
    /// 2. Channel, limit and timeframe come from the attempt's overrides,
    ///    falling back to `context`.
    /// 3. With a disabled limit the count is skipped; otherwise the attempt
    ///    is permitted iff the count of records at or after
    ///    `now - timeframe` is strictly below the limit.
    /// 4. A permitted attempt is recorded at `now`; a denied one is reported
    ///    to the notifier.
    ///
    /// # Errors
    /// `Configuration` if the channel's options cannot be resolved, `Storage`
    /// if the ledger fails. Notifier failures are logged, not returned.
    pub fn evaluate(
        &self,
        attempt: &DeliveryAttempt<'_>,
        context: &PolicyContext,
    ) -> Result<Decision, SafetynetError> {
        if context.is_whitelisted(attempt.address) {
            trace!(address = attempt.address, action = attempt.action, "whitelisted address");
            self.metrics.record_whitelisted();
            return Ok(Decision::Whitelisted);
        }

        let channel = attempt
            .channel
            .clone()
            .unwrap_or_else(|| context.channel().clone());
        let policy = context.resolve(&channel, attempt.limit, attempt.timeframe)?;
        let key = DeliveryKey::new(attempt.address, channel, attempt.action);
        let now = self.clock.now();

        let permitted = if policy.limit.is_disabled() {
            true
        } else {
            let count = self
                .ledger
                .count_matching(&key, policy.timeframe.since(now))?;
            policy.limit.permits(count)
        };

        if permitted {
            let id = self.ledger.record(&key, now)?;
            debug!(
                address = %key.address,
                channel = %key.channel,
                action = %key.action,
                record = %id,
                "delivery permitted"
            );
            self.metrics.record_permitted();
            return Ok(Decision::Permitted(id));
        }

        info!(
            address = %key.address,
            channel = %key.channel,
            action = %key.action,
            limit = %policy.limit,
            timeframe = %policy.timeframe,
            "delivery denied"
        );
        self.metrics.record_denied();
        self.notify_denied(&DenialNotice::new(
            key.address,
            key.channel,
            key.action,
            policy.limit,
            policy.timeframe,
        ));

        Ok(Decision::Denied)
    }

    /// [`evaluate`](Self::evaluate) reduced to "may this be delivered".
    pub fn permit_delivery(
        &self,
        attempt: &DeliveryAttempt<'_>,
        context: &PolicyContext,
    ) -> Result<bool, SafetynetError> {
        self.evaluate(attempt, context)
            .map(|decision| decision.is_permitted())
    }

    /// Hand a notice to the notifier; failures and panics are logged and
    /// swallowed so the caller still sees the denial.
    fn notify_denied(&self, notice: &DenialNotice) {
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| self.notifier.notify(notice)));

        let failure = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => "notifier panicked".to_string(),
        };

        self.metrics.record_notification_failure();
        error!(
            address = %notice.address,
            channel = %notice.channel,
            action = %notice.action,
            error = %failure,
            "failed to send denial notification"
        );
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Builder for [`RateDecisionEngine`].
#[derive(Debug)]
pub struct RateDecisionEngineBuilder<L: Ledger> {
    ledger: L,
    clock: Option<Arc<dyn Clock>>,
    notifier: Option<Arc<dyn DenialNotifier>>,
    metrics: Option<Metrics>,
}

impl<L: Ledger> RateDecisionEngineBuilder<L> {
    /// Use a custom clock (e.g. `MockClock` in tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn DenialNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Share counters with another engine.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> RateDecisionEngine<L> {
        RateDecisionEngine {
            ledger: self.ledger,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(LogNotifier::default())),
            metrics: self.metrics.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::channel::Channel;
    use crate::domain::policy::{ChannelOptions, Limit, Timeframe};
    use crate::domain::record::RecordId;
    use crate::infrastructure::ledger::InMemoryLedger;
    use crate::infrastructure::mocks::{MockClock, RecordingNotifier, UnavailableLedger};
    use chrono::{TimeDelta, Utc};
    use std::time::Duration;

    struct Harness {
        engine: RateDecisionEngine<Arc<InMemoryLedger>>,
        ledger: Arc<InMemoryLedger>,
        clock: Arc<MockClock>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(MockClock::new(Utc::now()));
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = RateDecisionEngine::builder(Arc::clone(&ledger))
            .with_clock(clock.clone())
            .with_notifier(notifier.clone())
            .build();
        Harness {
            engine,
            ledger,
            clock,
            notifier,
        }
    }

    fn email_context(limit: Limit, timeframe: Timeframe) -> PolicyContext {
        PolicyContext::builder(Channel::Email)
            .with_channel_options(Channel::Email, ChannelOptions::new(limit, timeframe))
            .build()
            .unwrap()
    }

    #[test]
    fn test_limit_then_window_expiry() {
        let h = harness();
        let context = email_context(Limit::Max(1), Timeframe::from_mins(5));
        let attempt = DeliveryAttempt::new("u@x.com", "send");

        assert!(h.engine.permit_delivery(&attempt, &context).unwrap());
        assert!(!h.engine.permit_delivery(&attempt, &context).unwrap());

        h.clock.advance(Duration::from_secs(6 * 60));
        assert!(h.engine.permit_delivery(&attempt, &context).unwrap());
    }

    #[test]
    fn test_nth_permitted_n_plus_one_denied() {
        let h = harness();
        let context = email_context(Limit::Max(3), Timeframe::Unbounded);
        let attempt = DeliveryAttempt::new("u@x.com", "digest");

        for _ in 0..3 {
            assert!(h.engine.permit_delivery(&attempt, &context).unwrap());
        }
        assert!(!h.engine.permit_delivery(&attempt, &context).unwrap());
        assert_eq!(h.ledger.len(), 3);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let h = harness();
        let context = email_context(Limit::Max(1), Timeframe::from_secs(60));
        let key = DeliveryKey::new("u@x.com", Channel::Email, "send");
        let now = h.clock.now();

        // exactly at now - T: inside the window
        h.ledger.record(&key, now - TimeDelta::seconds(60)).unwrap();
        let attempt = DeliveryAttempt::new("u@x.com", "send");
        assert_eq!(h.engine.evaluate(&attempt, &context).unwrap(), Decision::Denied);

        // just before now - T: outside the window
        h.ledger.purge_all().unwrap();
        h.ledger
            .record(&key, now - TimeDelta::seconds(60) - TimeDelta::nanoseconds(1))
            .unwrap();
        assert!(h.engine.evaluate(&attempt, &context).unwrap().is_permitted());
    }

    #[test]
    fn test_whitelisted_address_never_touches_ledger() {
        let h = harness();
        let context = email_context(Limit::Max(0), Timeframe::Unbounded);
        let attempt = DeliveryAttempt::new("test@example.com", "send");

        for _ in 0..5 {
            assert_eq!(
                h.engine.evaluate(&attempt, &context).unwrap(),
                Decision::Whitelisted
            );
        }
        assert!(h.ledger.is_empty());
        assert!(h.notifier.notices().is_empty());
        assert_eq!(h.engine.metrics().whitelisted(), 5);
    }

    #[test]
    fn test_zero_limit_always_denies() {
        let h = harness();
        let context = email_context(Limit::Max(0), Timeframe::from_mins(30));
        let attempt = DeliveryAttempt::new("u@x.com", "send");

        assert_eq!(h.engine.evaluate(&attempt, &context).unwrap(), Decision::Denied);
        assert!(h.ledger.is_empty());
    }

    #[test]
    fn test_disabled_limit_still_records() {
        let h = harness();
        let context = email_context(Limit::Disabled, Timeframe::Unbounded);
        let attempt = DeliveryAttempt::new("u@x.com", "send");

        for i in 0..4 {
            assert_eq!(
                h.engine.evaluate(&attempt, &context).unwrap(),
                Decision::Permitted(RecordId(i + 1))
            );
        }
        assert_eq!(h.ledger.len(), 4);
    }

    #[test]
    fn test_denial_notifies_once_with_policy() {
        let h = harness();
        let context = email_context(Limit::Max(1), Timeframe::from_secs(300));
        let attempt = DeliveryAttempt::new("u@x.com", "welcome");

        h.engine.evaluate(&attempt, &context).unwrap();
        h.engine.evaluate(&attempt, &context).unwrap();

        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(
            notices[0],
            DenialNotice::new(
                "u@x.com",
                Channel::Email,
                "welcome",
                Limit::Max(1),
                Timeframe::from_secs(300)
            )
        );
    }

    #[test]
    fn test_notifier_failure_does_not_mask_denial() {
        let h = harness();
        h.notifier.fail_with("smtp relay down");
        let context = email_context(Limit::Max(1), Timeframe::Unbounded);
        let attempt = DeliveryAttempt::new("u@x.com", "send");

        assert!(h.engine.permit_delivery(&attempt, &context).unwrap());
        assert!(!h.engine.permit_delivery(&attempt, &context).unwrap());
        assert_eq!(h.engine.metrics().notification_failures(), 1);
    }

    #[test]
    fn test_overrides_select_independent_bucket() {
        let h = harness();
        let context = email_context(Limit::Max(1), Timeframe::Unbounded);

        let email = DeliveryAttempt::new("u@x.com", "send");
        let sms = DeliveryAttempt::new("u@x.com", "send")
            .on_channel(Channel::Sms)
            .with_limit(Limit::Max(1))
            .with_timeframe(Timeframe::from_secs(1));

        assert!(h.engine.permit_delivery(&email, &context).unwrap());
        assert!(h.engine.permit_delivery(&sms, &context).unwrap());
        assert!(!h.engine.permit_delivery(&email, &context).unwrap());
        assert!(!h.engine.permit_delivery(&sms, &context).unwrap());
    }

    #[test]
    fn test_unconfigured_channel_is_configuration_error() {
        let h = harness();
        let context = PolicyContext::builder(Channel::Sms).build().unwrap();
        let attempt = DeliveryAttempt::new("u@x.com", "send_sms");

        let err = h.engine.evaluate(&attempt, &context).unwrap_err();
        assert!(err.is_configuration());
        assert!(h.ledger.is_empty());
    }

    #[test]
    fn test_storage_error_propagates() {
        let engine = RateDecisionEngine::builder(UnavailableLedger::new("connection refused"))
            .with_notifier(Arc::new(RecordingNotifier::new()))
            .build();
        let context = email_context(Limit::Max(1), Timeframe::Unbounded);

        let err = engine
            .evaluate(&DeliveryAttempt::new("u@x.com", "send"), &context)
            .unwrap_err();
        assert!(err.is_storage());
        assert_eq!(engine.metrics().snapshot().total_evaluations(), 0);
    }

    #[test]
    fn test_record_failure_propagates() {
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = RateDecisionEngine::builder(UnavailableLedger::new("write timeout"))
            .with_notifier(notifier.clone())
            .build();
        // A disabled limit skips the count, so the first ledger call is `record`
        let context = email_context(Limit::Disabled, Timeframe::Unbounded);

        let err = engine
            .evaluate(&DeliveryAttempt::new("u@x.com", "send"), &context)
            .unwrap_err();
        assert!(err.is_storage());
        assert!(err.to_string().contains("write timeout"));
        assert_eq!(engine.metrics().permitted(), 0);
        assert!(notifier.notices().is_empty());
    }

    #[test]
    fn test_whitelist_bypasses_even_broken_ledger() {
        let engine = RateDecisionEngine::builder(UnavailableLedger::new("down")).build();
        let context = email_context(Limit::Max(1), Timeframe::Unbounded);

        let decision = engine
            .evaluate(&DeliveryAttempt::new("ops@example.com", "send"), &context)
            .unwrap();
        assert_eq!(decision, Decision::Whitelisted);
    }
}
