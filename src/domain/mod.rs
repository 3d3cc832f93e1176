//! Domain layer - pure types with no I/O.
//!
//! - Channels and delivery keys (the rate-limit buckets)
//! - Delivery records kept by the ledger
//! - Layered policy configuration and its resolution
//! - Attempts, decisions and denial notices

pub mod channel;
pub mod decision;
pub mod policy;
pub mod record;
