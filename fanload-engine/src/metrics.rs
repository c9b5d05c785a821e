//! Loader metrics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracking loader activity since construction.
#[derive(Debug, Default)]
pub struct LoaderMetrics {
    /// Loads answered from an already-settled cache entry.
    pub cache_hits: AtomicU64,

    /// Keys seeded via `prime`.
    pub keys_primed: AtomicU64,

    /// Batches handed to the worker pool.
    pub batches_dispatched: AtomicU64,

    /// Keys included in dispatched batches.
    pub keys_fetched: AtomicU64,

    /// Wholesale batch-fetch failures.
    pub fetch_errors: AtomicU64,
}

impl LoaderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            keys_primed: self.keys_primed.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            keys_fetched: self.keys_fetched.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of loader metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub keys_primed: u64,
    pub batches_dispatched: u64,
    pub keys_fetched: u64,
    pub fetch_errors: u64,
}
