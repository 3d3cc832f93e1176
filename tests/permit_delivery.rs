use chrono::{TimeDelta, Utc};
use safetynet::application::ports::Clock;
use safetynet::infrastructure::mocks::{MockClock, RecordingNotifier};
use safetynet::{
    Channel, ChannelOptions, Decision, DeliveryAttempt, DeliveryKey, InMemoryLedger, Ledger,
    Limit, PolicyContext, RateDecisionEngine, RateLimitable, Timeframe,
};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    engine: RateDecisionEngine<Arc<InMemoryLedger>>,
    ledger: Arc<InMemoryLedger>,
    clock: Arc<MockClock>,
    notifier: Arc<RecordingNotifier>,
}

fn fixture() -> Fixture {
    let ledger = Arc::new(InMemoryLedger::new());
    let clock = Arc::new(MockClock::new(Utc::now()));
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = RateDecisionEngine::builder(Arc::clone(&ledger))
        .with_clock(clock.clone())
        .with_notifier(notifier.clone())
        .build();
    Fixture {
        engine,
        ledger,
        clock,
        notifier,
    }
}

/// A model with a phone number that texts users.
struct User {
    phone: String,
    policy: PolicyContext,
}

impl User {
    fn new(phone: &str) -> Self {
        let policy = PolicyContext::builder(Channel::Sms)
            .with_channel_options(
                Channel::Sms,
                ChannelOptions::new(Limit::Max(1), Timeframe::from_mins(5)),
            )
            .build()
            .unwrap();
        Self {
            phone: phone.to_string(),
            policy,
        }
    }

    fn send_sms(&self, engine: &RateDecisionEngine<Arc<InMemoryLedger>>) -> bool {
        let attempt = DeliveryAttempt::new(&self.phone, "send_sms");
        self.permit_delivery(engine, &attempt).unwrap()
    }
}

impl RateLimitable for User {
    fn policy(&self) -> &PolicyContext {
        &self.policy
    }
}

#[test]
fn test_one_sms_per_five_minutes() {
    let f = fixture();
    let user = User::new("+15550100");

    assert!(user.send_sms(&f.engine));
    assert!(!user.send_sms(&f.engine));

    f.clock.advance(Duration::from_secs(6 * 60));
    assert!(user.send_sms(&f.engine));

    let key = DeliveryKey::new("+15550100", Channel::Sms, "send_sms");
    assert_eq!(f.ledger.count_matching(&key, None).unwrap(), 2);
    assert_eq!(f.notifier.addresses(), vec!["+15550100"]);
}

#[test]
fn test_record_exactly_at_window_start_is_counted() {
    let f = fixture();
    let user = User::new("+15550100");

    assert!(user.send_sms(&f.engine));

    // The earlier record now sits exactly at now - 5min
    f.clock.advance(Duration::from_secs(5 * 60));
    assert!(!user.send_sms(&f.engine));

    f.clock.advance(Duration::from_millis(1));
    assert!(user.send_sms(&f.engine));
}

#[test]
fn test_buckets_are_independent() {
    let f = fixture();
    let policy = PolicyContext::builder(Channel::Email).build().unwrap();

    let attempts = [
        DeliveryAttempt::new("u@x.com", "welcome"),
        DeliveryAttempt::new("v@x.com", "welcome"),
        DeliveryAttempt::new("u@x.com", "receipt"),
        DeliveryAttempt::new("u@x.com", "welcome")
            .on_channel(Channel::Sms)
            .with_limit(Limit::Max(1))
            .with_timeframe(Timeframe::from_mins(30)),
    ];

    for attempt in &attempts {
        assert!(f.engine.permit_delivery(attempt, &policy).unwrap());
    }
    for attempt in &attempts {
        assert!(!f.engine.permit_delivery(attempt, &policy).unwrap());
    }

    assert_eq!(f.ledger.len(), 4);
    assert_eq!(f.notifier.notices().len(), 4);
}

#[test]
fn test_builtin_email_default_is_one_per_thirty_minutes() {
    let f = fixture();
    let policy = PolicyContext::builder(Channel::Email).build().unwrap();
    let attempt = DeliveryAttempt::new("u@x.com", "digest");

    assert!(f.engine.permit_delivery(&attempt, &policy).unwrap());

    f.clock.advance(Duration::from_secs(29 * 60));
    assert!(!f.engine.permit_delivery(&attempt, &policy).unwrap());

    f.clock.advance(Duration::from_secs(60 + 1));
    assert!(f.engine.permit_delivery(&attempt, &policy).unwrap());
}

#[test]
fn test_unbounded_timeframe_counts_all_history() {
    let f = fixture();
    let policy = PolicyContext::builder(Channel::Email)
        .with_channel_options(
            Channel::Email,
            ChannelOptions::new(Limit::Max(2), Timeframe::Unbounded),
        )
        .build()
        .unwrap();
    let attempt = DeliveryAttempt::new("u@x.com", "onboarding");

    assert!(f.engine.permit_delivery(&attempt, &policy).unwrap());
    f.clock.advance(Duration::from_secs(365 * 24 * 3600));
    assert!(f.engine.permit_delivery(&attempt, &policy).unwrap());
    f.clock.advance(Duration::from_secs(365 * 24 * 3600));
    assert!(!f.engine.permit_delivery(&attempt, &policy).unwrap());
}

#[test]
fn test_records_carry_evaluation_time() {
    let f = fixture();
    let policy = PolicyContext::builder(Channel::Email).build().unwrap();
    let now = f.clock.now();

    let decision = f
        .engine
        .evaluate(&DeliveryAttempt::new("u@x.com", "welcome"), &policy)
        .unwrap();
    let id = decision.record_id().unwrap();

    let records = f
        .ledger
        .records(&DeliveryKey::new("u@x.com", Channel::Email, "welcome"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].created_at, now);
}

#[test]
fn test_history_seeded_out_of_band_counts() {
    let f = fixture();
    let policy = PolicyContext::builder(Channel::Email).build().unwrap();
    let key = DeliveryKey::new("u@x.com", Channel::Email, "welcome");

    f.ledger
        .record(&key, f.clock.now() - TimeDelta::minutes(10))
        .unwrap();

    let decision = f
        .engine
        .evaluate(&DeliveryAttempt::new("u@x.com", "welcome"), &policy)
        .unwrap();
    assert_eq!(decision, Decision::Denied);
}

#[test]
fn test_custom_whitelist_replaces_builtin() {
    let f = fixture();
    let policy = PolicyContext::builder(Channel::Email)
        .with_whitelist(r"@staff\.test$")
        .with_channel_options(
            Channel::Email,
            ChannelOptions::default().with_limit(Limit::Max(0)),
        )
        .build()
        .unwrap();

    let staff = DeliveryAttempt::new("qa@staff.test", "welcome");
    let example = DeliveryAttempt::new("qa@example.com", "welcome");

    assert_eq!(f.engine.evaluate(&staff, &policy).unwrap(), Decision::Whitelisted);
    assert_eq!(f.engine.evaluate(&example, &policy).unwrap(), Decision::Denied);
}

#[test]
fn test_whitelist_is_case_sensitive() {
    let f = fixture();
    let policy = PolicyContext::builder(Channel::Email)
        .with_channel_options(
            Channel::Email,
            ChannelOptions::default().with_limit(Limit::Max(0)),
        )
        .build()
        .unwrap();

    let upper = DeliveryAttempt::new("QA@EXAMPLE.COM", "welcome");
    assert_eq!(f.engine.evaluate(&upper, &policy).unwrap(), Decision::Denied);
}

#[test]
fn test_metrics_track_outcomes() {
    let f = fixture();
    let policy = PolicyContext::builder(Channel::Email).build().unwrap();

    f.engine
        .evaluate(&DeliveryAttempt::new("u@x.com", "welcome"), &policy)
        .unwrap();
    f.engine
        .evaluate(&DeliveryAttempt::new("u@x.com", "welcome"), &policy)
        .unwrap();
    f.engine
        .evaluate(&DeliveryAttempt::new("u@example.com", "welcome"), &policy)
        .unwrap();

    let snapshot = f.engine.metrics().snapshot();
    assert_eq!(snapshot.permitted, 1);
    assert_eq!(snapshot.denied, 1);
    assert_eq!(snapshot.whitelisted, 1);
    assert!((snapshot.denial_rate() - 0.5).abs() < f64::EPSILON);
}
