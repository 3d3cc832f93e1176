//! In-process delivery ledger.
//!
//! Records are grouped per [`DeliveryKey`] in a sharded concurrent map, so
//! counting one bucket never contends with writes to another.

use crate::application::ports::Ledger;
use crate::domain::record::{DeliveryKey, DeliveryRecord, RecordId};
use crate::error::StorageError;
use ahash::RandomState;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: RecordId,
    created_at: DateTime<Utc>,
}

/// Thread-safe ledger backed by DashMap.
///
/// History lives as long as the ledger; nothing is expired. Use
/// [`purge_all`](Ledger::purge_all) to reset it.
#[derive(Debug)]
pub struct InMemoryLedger {
    buckets: DashMap<DeliveryKey, Vec<Entry>, RandomState>,
    next_id: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::with_hasher(RandomState::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Total number of records across all keys.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records stored for `key`, oldest insertion first.
    pub fn records(&self, key: &DeliveryKey) -> Vec<DeliveryRecord> {
        self.buckets
            .get(key)
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|entry| DeliveryRecord::new(entry.id, key.clone(), entry.created_at))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for InMemoryLedger {
    fn record(&self, key: &DeliveryKey, at: DateTime<Utc>) -> Result<RecordId, StorageError> {
        let id = RecordId(self.next_id.fetch_add(1, Ordering::Relaxed));

        // Lookup first to avoid cloning the key on the hot path
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            bucket.push(Entry { id, created_at: at });
            return Ok(id);
        }

        self.buckets
            .entry(key.clone())
            .or_default()
            .push(Entry { id, created_at: at });
        Ok(id)
    }

    fn count_matching(
        &self,
        key: &DeliveryKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, StorageError> {
        let count = match self.buckets.get(key) {
            Some(bucket) => match since {
                None => bucket.len(),
                Some(since) => bucket
                    .iter()
                    .filter(|entry| entry.created_at >= since)
                    .count(),
            },
            None => 0,
        };
        Ok(count as u64)
    }

    fn purge_all(&self) -> Result<(), StorageError> {
        self.buckets.clear();
        Ok(())
    }
}
