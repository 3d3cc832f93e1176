//! Ports (interfaces) for the application layer.
//!
//! The decision engine depends only on these traits. Infrastructure provides
//! the adapters: `SystemClock`/`MockClock`, `InMemoryLedger`/`RedisLedger`,
//! `LogNotifier`/`RecordingNotifier`.

use crate::domain::decision::DenialNotice;
use crate::domain::record::{DeliveryKey, RecordId};
use crate::error::{NotifierError, StorageError};
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;

/// Port for obtaining the current time.
///
/// Record timestamps and window bounds both come from here, so tests can
/// move time across window edges deterministically.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Port for the append-only delivery history.
///
/// Implementations must make every `record` visible to later
/// `count_matching` calls on the same store; no caching.
pub trait Ledger: Send + Sync + Debug {
    /// Append one immutable record for `key` created at `at`.
    ///
    /// # Errors
    /// `StorageError` if the backing store is unavailable.
    fn record(&self, key: &DeliveryKey, at: DateTime<Utc>) -> Result<RecordId, StorageError>;

    /// Count records with exactly this key created at or after `since`.
    ///
    /// `None` counts all history for the key.
    fn count_matching(
        &self,
        key: &DeliveryKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, StorageError>;

    /// Remove every record. Administrative; not on the decision path.
    fn purge_all(&self) -> Result<(), StorageError>;
}

impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    fn record(&self, key: &DeliveryKey, at: DateTime<Utc>) -> Result<RecordId, StorageError> {
        (**self).record(key, at)
    }

    fn count_matching(
        &self,
        key: &DeliveryKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, StorageError> {
        (**self).count_matching(key, since)
    }

    fn purge_all(&self) -> Result<(), StorageError> {
        (**self).purge_all()
    }
}

/// Port for reporting a denied delivery to operators.
///
/// Called exactly once per denied address per evaluation. Failures are
/// logged by the engine and never change the decision.
pub trait DenialNotifier: Send + Sync + Debug {
    fn notify(&self, notice: &DenialNotice) -> Result<(), NotifierError>;
}
