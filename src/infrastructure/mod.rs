//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - Ledgers (in-process sharded map, Redis)
//! - Denial notification via `tracing`
//! - Process-wide configuration loading

pub mod clock;
pub mod config;
pub mod ledger;
pub mod notifier;

#[cfg(feature = "redis-ledger")]
pub mod redis_ledger;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// safetynet = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
