//! Application layer - orchestration of domain logic.
//!
//! - Rate decision engine (count, decide, record, notify)
//! - Batch recipient filtering and the outbound-message hook
//! - The `RateLimitable` trait for policy owners
//! - Outcome counters
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement: a clock, a ledger and a denial notifier.

pub mod batch;
pub mod engine;
pub mod limitable;
pub mod metrics;
pub mod ports;
