//! Example demonstrating a delivery ledger shared through Redis.
//!
//! Two engines stand in for two application instances. Both write to the
//! same sorted sets, so an SMS code sent by one instance counts against the
//! limit seen by the other.
//!
//! # Quick Start
//!
//! 1. Start Redis:
//!    ```bash
//!    docker run -p 6379:6379 redis:7-alpine
//!    ```
//!
//! 2. Run the example (from project root):
//!    ```bash
//!    cargo run --example redis --features redis-ledger
//!    ```
//!
//! Run it twice within five minutes to see the second run denied from the
//! first run's history.

use safetynet::{
    Channel, ChannelOptions, DeliveryAttempt, DeliveryKey, Ledger, Limit, PolicyContext,
    RateDecisionEngine, RedisLedger, RedisLedgerConfig, Timeframe,
};
use tracing::info;

// The ledger port blocks, which needs a multi-threaded runtime
#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let config = RedisLedgerConfig {
        key_prefix: "safetynet:demo:".to_string(),
    };
    let first = RateDecisionEngine::builder(
        RedisLedger::connect_with_config("redis://127.0.0.1:6379", config.clone()).await?,
    )
    .build();
    let second = RateDecisionEngine::builder(
        RedisLedger::connect_with_config("redis://127.0.0.1:6379", config).await?,
    )
    .build();

    let policy = PolicyContext::builder(Channel::Sms)
        .with_channel_options(
            Channel::Sms,
            ChannelOptions::new(Limit::Max(2), Timeframe::from_mins(5)),
        )
        .build()?;
    let attempt = DeliveryAttempt::new("+15550100", "send_code");

    info!("=== Shared Ledger Test ===");
    info!("Policy: 2 verification codes per number every 5 minutes");
    for round in 1..=2 {
        let decision = first.evaluate(&attempt, &policy)?;
        info!(round, instance = "first", ?decision, "evaluated");
        let decision = second.evaluate(&attempt, &policy)?;
        info!(round, instance = "second", ?decision, "evaluated");
    }

    let key = DeliveryKey::new(attempt.address, Channel::Sms, attempt.action);
    let recorded = first.ledger().count_matching(&key, None)?;
    info!(recorded, "records visible to either instance");

    info!("=== Example Complete ===");
    info!("History persists in Redis; clear it with `purge_all` or let the window pass");

    Ok(())
}
