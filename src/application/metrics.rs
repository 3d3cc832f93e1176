//! Observability counters for decision outcomes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters tracking what the decision engine has done.
///
/// Clones share the same counters. All updates are relaxed atomics.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    permitted: AtomicU64,
    denied: AtomicU64,
    whitelisted: AtomicU64,
    /// Deliveries whose action was outside the owner's action filter
    bypassed: AtomicU64,
    notification_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_permitted(&self) {
        self.inner.permitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self) {
        self.inner.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_whitelisted(&self) {
        self.inner.whitelisted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bypassed(&self) {
        self.inner.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_notification_failure(&self) {
        self.inner
            .notification_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn permitted(&self) -> u64 {
        self.inner.permitted.load(Ordering::Relaxed)
    }

    pub fn denied(&self) -> u64 {
        self.inner.denied.load(Ordering::Relaxed)
    }

    pub fn whitelisted(&self) -> u64 {
        self.inner.whitelisted.load(Ordering::Relaxed)
    }

    pub fn bypassed(&self) -> u64 {
        self.inner.bypassed.load(Ordering::Relaxed)
    }

    pub fn notification_failures(&self) -> u64 {
        self.inner.notification_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            permitted: self.permitted(),
            denied: self.denied(),
            whitelisted: self.whitelisted(),
            bypassed: self.bypassed(),
            notification_failures: self.notification_failures(),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.inner.permitted.store(0, Ordering::Relaxed);
        self.inner.denied.store(0, Ordering::Relaxed);
        self.inner.whitelisted.store(0, Ordering::Relaxed);
        self.inner.bypassed.store(0, Ordering::Relaxed);
        self.inner.notification_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub permitted: u64,
    pub denied: u64,
    pub whitelisted: u64,
    pub bypassed: u64,
    pub notification_failures: u64,
}

impl MetricsSnapshot {
    /// Evaluations that reached a decision (whitelisted, permitted or denied).
    pub fn total_evaluations(&self) -> u64 {
        self.permitted
            .saturating_add(self.denied)
            .saturating_add(self.whitelisted)
    }

    /// Share of counted evaluations that were denied, 0.0 to 1.0.
    ///
    /// Whitelisted evaluations are excluded; they never touch the ledger.
    pub fn denial_rate(&self) -> f64 {
        let counted = self.permitted.saturating_add(self.denied);
        if counted == 0 {
            0.0
        } else {
            self.denied as f64 / counted as f64
        }
    }
}
