//! Delivery history rows and the bucket key they are counted under.

use crate::domain::channel::Channel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by a ledger when a delivery is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `(address, channel, action)` tuple a rate limit applies to.
///
/// Every distinct key is an independent bucket. Matching is exact: the
/// address is never normalised or case-folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeliveryKey {
    pub address: String,
    pub channel: Channel,
    pub action: String,
}

impl DeliveryKey {
    pub fn new(address: impl Into<String>, channel: Channel, action: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            channel,
            action: action.into(),
        }
    }
}

impl fmt::Display for DeliveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.channel, self.action, self.address)
    }
}

/// One permitted delivery. Records are never updated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: RecordId,
    pub key: DeliveryKey,
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    pub fn new(id: RecordId, key: DeliveryKey, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            key,
            created_at,
        }
    }

    /// Whether this record falls inside a window starting at `since`.
    ///
    /// The lower bound is inclusive; `None` means all history counts.
    pub fn is_within(&self, since: Option<DateTime<Utc>>) -> bool {
        since.map_or(true, |since| self.created_at >= since)
    }
}
