//! Loader configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default debounce window between the last key arrival and a flush.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(16);

/// Default number of concurrently-running batch fetches.
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 1;

/// Configuration for a loader instance.
///
/// Each option is independent and composable. Applied at construction; a
/// running loader never re-reads its config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Debounce window: idle time after the most recent key arrival before
    /// the pending batch is flushed (default: 16 ms). Each new arrival pushes
    /// the flush deadline forward.
    pub batch_window: Duration,

    /// Maximum keys per batch. Reaching this size flushes immediately,
    /// preempting the window. `0` disables the size trigger (flush only on
    /// timer), which is the default.
    pub max_batch_size: usize,

    /// How many batch fetches may run concurrently (default: 1). A saturated
    /// pool backpressures the dispatch loop until a slot frees up.
    pub max_concurrent_batches: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_window: DEFAULT_BATCH_WINDOW,
            max_batch_size: 0,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
        }
    }
}

impl LoaderConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce window.
    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }

    /// Set the size trigger (0 = unbounded, timer-only flushing).
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Set the worker-pool concurrency cap.
    pub fn with_max_concurrent_batches(mut self, workers: usize) -> Self {
        self.max_concurrent_batches = workers;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `max_concurrent_batches` is
    /// zero: a pool with no slots could never dispatch a batch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_batches == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_batches".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
