//! Mock implementations for testing.
//!
//! Test doubles for the application ports plus a capturing tracing layer.

pub mod clock;
pub mod layer;
pub mod ledger;
pub mod notifier;

pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
pub use ledger::UnavailableLedger;
pub use notifier::RecordingNotifier;
