//! Ledger whose backing store is always down.

use crate::application::ports::Ledger;
use crate::domain::record::{DeliveryKey, RecordId};
use crate::error::StorageError;
use chrono::{DateTime, Utc};

/// Fails every operation with [`StorageError::Unavailable`].
#[derive(Debug, Clone)]
pub struct UnavailableLedger {
    reason: String,
}

impl UnavailableLedger {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> StorageError {
        StorageError::Unavailable(self.reason.clone())
    }
}

impl Ledger for UnavailableLedger {
    fn record(&self, _key: &DeliveryKey, _at: DateTime<Utc>) -> Result<RecordId, StorageError> {
        Err(self.error())
    }

    fn count_matching(
        &self,
        _key: &DeliveryKey,
        _since: Option<DateTime<Utc>>,
    ) -> Result<u64, StorageError> {
        Err(self.error())
    }

    fn purge_all(&self) -> Result<(), StorageError> {
        Err(self.error())
    }
}
