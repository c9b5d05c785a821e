//! Error types for fanload operations

use thiserror::Error;

/// Per-key load errors.
///
/// Every error a caller can observe from `load`/`load_many` is one of these
/// variants, returned as a value. A failed key stays settled to its failure
/// for the lifetime of the engine; re-prime the key or build a fresh engine
/// to retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The batch fetch succeeded but its output mapping omitted this key.
    #[error("key not found in batch result: {key}")]
    NotFound { key: String },

    /// The batch fetch failed wholesale; every key in that batch carries the
    /// same reason.
    #[error("batch fetch failed: {reason}")]
    BatchFailed { reason: String },

    /// The engine was terminated before this key settled.
    #[error("loader terminated")]
    Terminated,

    /// A result slot was read before settlement. Defensive guard; never
    /// expected when the blocking logic is correct.
    #[error("no result")]
    NoResult,
}

/// Error returned by an injected batch-fetch operation.
///
/// Carries a plain string payload so one wholesale failure can be propagated
/// verbatim to every key of the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct FetchError {
    pub reason: String,
}

impl FetchError {
    /// Create a fetch error from anything displayable.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<String> for FetchError {
    fn from(reason: String) -> Self {
        Self { reason }
    }
}

impl From<&str> for FetchError {
    fn from(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// Construction-time configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Result type alias for per-key load outcomes.
pub type LoadResult<T> = Result<T, LoadError>;

// =============================================================================
// TESTS
// =============================================================================
