//! Redis-backed delivery ledger.
//!
//! Lets several processes share one delivery history, so a limit holds
//! across every instance that sends on behalf of the same application.
//!
//! ## Layout
//!
//! - One sorted set per [`DeliveryKey`]; scores are creation times in Unix
//!   microseconds (exact in an `f64` until roughly the year 2255)
//! - Members are `{id}:{nanos}`, where `nanos` is the part of the creation
//!   time below one microsecond
//! - Record ids come from `INCR {prefix}seq`
//! - `count_matching` is a `ZCOUNT key since +inf` (inclusive lower bound).
//!   When `since` falls inside a microsecond, rows sharing that microsecond
//!   are compared on their nanosecond remainder, so the boundary is exact
//!
//! ## Error Handling
//!
//! Every Redis failure is returned as [`StorageError`]; the ledger never
//! falls back to local state.
//!
//! ## Runtime
//!
//! The [`Ledger`] port is synchronous. Inside a multi-threaded tokio runtime
//! calls are bridged with `block_in_place`; outside one, a temporary
//! current-thread runtime is built per call. Calls made from a current-thread
//! runtime fail with [`StorageError::Unavailable`] instead of blocking it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use safetynet::{RateDecisionEngine, RedisLedger, RedisLedgerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisLedgerConfig {
//!         key_prefix: "myapp:safetynet:".to_string(),
//!     };
//!     let ledger = RedisLedger::connect_with_config("redis://127.0.0.1/", config).await?;
//!     let engine = RateDecisionEngine::builder(ledger).build();
//!     Ok(())
//! }
//! ```

use crate::application::ports::Ledger;
use crate::domain::record::{DeliveryKey, RecordId};
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::fmt;
use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Configuration for [`RedisLedger`].
#[derive(Debug, Clone)]
pub struct RedisLedgerConfig {
    /// Prefix for every key the ledger touches (default: "safetynet:")
    pub key_prefix: String,
}

impl Default for RedisLedgerConfig {
    fn default() -> Self {
        Self {
            key_prefix: "safetynet:".to_string(),
        }
    }
}

/// Ledger stored in Redis sorted sets.
#[derive(Clone)]
pub struct RedisLedger {
    connection: ConnectionManager,
    config: RedisLedgerConfig,
}

impl fmt::Debug for RedisLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisLedger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisLedger {
    /// Connect with the default key prefix.
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        Self::connect_with_config(url, RedisLedgerConfig::default()).await
    }

    pub async fn connect_with_config(
        url: &str,
        config: RedisLedgerConfig,
    ) -> Result<Self, StorageError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self { connection, config })
    }

    pub fn config(&self) -> &RedisLedgerConfig {
        &self.config
    }

    /// Redis key for a bucket.
    ///
    /// Channel and action are length-prefixed so no two distinct keys share
    /// a Redis key, whatever characters they contain.
    fn bucket_key(&self, key: &DeliveryKey) -> String {
        let channel = key.channel.as_str();
        format!(
            "{}{}:{}:{}:{}:{}",
            self.config.key_prefix,
            channel.len(),
            channel,
            key.action.len(),
            key.action,
            key.address
        )
    }

    fn sequence_key(&self) -> String {
        format!("{}seq", self.config.key_prefix)
    }
}

/// Nanoseconds of `at` below its whole microsecond.
fn sub_micros(at: DateTime<Utc>) -> u32 {
    at.timestamp_subsec_nanos() % 1_000
}

fn member(id: u64, at: DateTime<Utc>) -> String {
    format!("{id}:{}", sub_micros(at))
}

/// Nanosecond remainder stored in a member; a bare id reads as zero.
fn member_sub_micros(member: &str) -> u32 {
    member
        .rsplit_once(':')
        .and_then(|(_, nanos)| nanos.parse().ok())
        .unwrap_or(0)
}

/// Drive a Redis future to completion from the synchronous [`Ledger`] port.
fn block_on<F, T>(operation: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, RedisError>>,
{
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            // block_in_place panics here, and block_on would stall the only worker
            RuntimeFlavor::CurrentThread => Err(StorageError::Unavailable(
                "redis ledger cannot block inside a current-thread tokio runtime".to_string(),
            )),
            _ => tokio::task::block_in_place(|| handle.block_on(operation))
                .map_err(StorageError::from),
        },
        Err(_) => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| StorageError::Unavailable(format!("failed to start runtime: {e}")))?;
            rt.block_on(operation).map_err(StorageError::from)
        }
    }
}

impl Ledger for RedisLedger {
    fn record(&self, key: &DeliveryKey, at: DateTime<Utc>) -> Result<RecordId, StorageError> {
        let bucket = self.bucket_key(key);
        let sequence = self.sequence_key();
        let mut conn = self.connection.clone();

        let result = block_on(async {
            let id: u64 = conn.incr(&sequence, 1u64).await?;
            conn.zadd::<_, _, _, ()>(&bucket, member(id, at), at.timestamp_micros())
                .await?;
            Ok(RecordId(id))
        });

        if let Err(e) = &result {
            tracing::warn!(error = %e, key = %key, "Failed to record delivery in Redis");
        }
        result
    }

    fn count_matching(
        &self,
        key: &DeliveryKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, StorageError> {
        let bucket = self.bucket_key(key);
        let mut conn = self.connection.clone();

        let result = block_on(async {
            let Some(since) = since else {
                return conn.zcard(&bucket).await;
            };

            let floor = since.timestamp_micros();
            let threshold = sub_micros(since);
            if threshold == 0 {
                return conn.zcount(&bucket, floor, "+inf").await;
            }

            // Rows in the microsecond containing `since` are split on their
            // sub-microsecond remainder
            let (later, edge): (u64, Vec<String>) = redis::pipe()
                .atomic()
                .cmd("ZCOUNT")
                .arg(&bucket)
                .arg(format!("({floor}"))
                .arg("+inf")
                .cmd("ZRANGEBYSCORE")
                .arg(&bucket)
                .arg(floor)
                .arg(floor)
                .query_async(&mut conn)
                .await?;
            let on_edge = edge
                .iter()
                .filter(|m| member_sub_micros(m) >= threshold)
                .count() as u64;
            Ok(later + on_edge)
        });

        if let Err(e) = &result {
            tracing::warn!(error = %e, key = %key, "Failed to count deliveries in Redis");
        }
        result
    }

    fn purge_all(&self) -> Result<(), StorageError> {
        let pattern = format!("{}*", self.config.key_prefix);
        let mut conn = self.connection.clone();

        block_on(async {
            let mut cursor = 0u64;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(100)
                    .query_async(&mut conn)
                    .await?;

                if !keys.is_empty() {
                    conn.del::<_, ()>(&keys).await?;
                }

                if next == 0 {
                    break;
                }
                cursor = next;
            }
            Ok(())
        })
    }
}
