//! Global atomic counters for runguard observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when the daemon shuts down).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lock-free atomic counters.
pub struct Metrics {
    requests_handled: AtomicU64,
    authorization_denials: AtomicU64,
    metric_items_recorded: AtomicU64,
    metric_items_failed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            requests_handled: AtomicU64::new(0),
            authorization_denials: AtomicU64::new(0),
            metric_items_recorded: AtomicU64::new(0),
            metric_items_failed: AtomicU64::new(0),
        }
    }

    pub fn inc_requests(&self) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "requests_handled", "counter incremented");
    }

    pub fn inc_denials(&self) {
        self.authorization_denials.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "authorization_denials", "counter incremented");
    }

    pub fn add_metric_items(&self, recorded: u64, failed: u64) {
        self.metric_items_recorded
            .fetch_add(recorded, Ordering::Relaxed);
        self.metric_items_failed.fetch_add(failed, Ordering::Relaxed);
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            requests_handled = self.requests_handled(),
            authorization_denials = self.authorization_denials(),
            metric_items_recorded = self.metric_items_recorded(),
            metric_items_failed = self.metric_items_failed(),
        );
    }

    pub fn requests_handled(&self) -> u64 {
        self.requests_handled.load(Ordering::Relaxed)
    }

    pub fn authorization_denials(&self) -> u64 {
        self.authorization_denials.load(Ordering::Relaxed)
    }

    pub fn metric_items_recorded(&self) -> u64 {
        self.metric_items_recorded.load(Ordering::Relaxed)
    }

    pub fn metric_items_failed(&self) -> u64 {
        self.metric_items_failed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.requests_handled.store(0, Ordering::Relaxed);
        self.authorization_denials.store(0, Ordering::Relaxed);
        self.metric_items_recorded.store(0, Ordering::Relaxed);
        self.metric_items_failed.store(0, Ordering::Relaxed);
    }
}
