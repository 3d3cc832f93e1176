//! Basic example demonstrating per-recipient delivery limits.
//!
//! An e-mail channel allows one delivery per address and action every 30
//! minutes, and an SMS channel allows one verification code every 5 minutes.
//! Denials show up as `safetynet::denial` warnings from the default notifier.
//!
//! ```bash
//! cargo run --example basic
//! ```

use safetynet::{
    Channel, ChannelOptions, DeliveryAttempt, InMemoryLedger, Limit, OutboundMessage,
    PolicyContext, RateDecisionEngine, SafetynetError, Timeframe,
};

fn main() -> Result<(), SafetynetError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let engine = RateDecisionEngine::builder(InMemoryLedger::new()).build();

    // Built-in defaults: e-mail, 1 per 30 minutes, `@example.com` whitelisted
    let mailer = PolicyContext::builder(Channel::Email).build()?;

    println!("=== Basic Delivery Limiting Example ===\n");
    println!("Policy: 1 welcome e-mail per address every 30 minutes\n");

    println!("Sending the same welcome e-mail 3 times:");
    let welcome = DeliveryAttempt::new("user@mail.test", "welcome");
    for i in 1..=3 {
        let decision = engine.evaluate(&welcome, &mailer)?;
        println!("  attempt {i}: {decision:?}");
    }

    println!("\nA different action has its own limit:");
    let receipt = DeliveryAttempt::new("user@mail.test", "receipt");
    println!("  receipt: {:?}", engine.evaluate(&receipt, &mailer)?);

    println!("\nWhitelisted addresses are never limited:");
    let qa = DeliveryAttempt::new("qa@example.com", "welcome");
    for i in 1..=3 {
        println!("  attempt {i}: {:?}", engine.evaluate(&qa, &mailer)?);
    }

    println!("\nFiltering a batch (user@mail.test already had its welcome):");
    let mut message = OutboundMessage::new(["user@mail.test", "new@mail.test", "qa@example.com"]);
    let deliver = engine.check_delivery_window(&mut message, "welcome", &mailer)?;
    println!("  deliver: {deliver}, recipients: {:?}", message.recipients);

    println!("\nSMS verification codes, 1 per 5 minutes:");
    let codes = PolicyContext::builder(Channel::Sms)
        .with_channel_options(
            Channel::Sms,
            ChannelOptions::new(Limit::Max(1), Timeframe::from_mins(5)),
        )
        .build()?;
    let code = DeliveryAttempt::new("+15550100", "send_code");
    for i in 1..=2 {
        println!("  attempt {i}: {:?}", engine.evaluate(&code, &codes)?);
    }

    let metrics = engine.metrics().snapshot();
    println!("\n=== Example Complete ===");
    println!(
        "permitted: {}, denied: {}, whitelisted: {}",
        metrics.permitted, metrics.denied, metrics.whitelisted
    );

    Ok(())
}
