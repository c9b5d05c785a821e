//! Single-assignment result slot.
//!
//! A `ResultSlot` is the write-once container behind every cached key: it
//! starts unsettled and transitions exactly once to either a success value or
//! a [`LoadError`]. Batch completion, termination and priming can race to
//! settle the same key; only the first writer wins and later attempts are
//! silent no-ops.

use crate::error::{LoadError, LoadResult};
use std::sync::OnceLock;

/// Thread-safe write-once container for a per-key outcome.
///
/// Shared as `Arc<ResultSlot<V>>` between the engine (writer) and any number
/// of waiting callers (readers). Readers never need an external lock: the
/// internal once-cell provides the happens-before edge for the settled value.
#[derive(Debug)]
pub struct ResultSlot<V> {
    state: OnceLock<LoadResult<V>>,
}

impl<V> ResultSlot<V> {
    /// Create an unsettled slot.
    pub fn new() -> Self {
        Self {
            state: OnceLock::new(),
        }
    }

    /// Settle the slot with a success value.
    ///
    /// Returns `true` if this call won the settlement race. A slot already
    /// settled (by either outcome) is left untouched.
    pub fn resolve(&self, value: V) -> bool {
        self.state.set(Ok(value)).is_ok()
    }

    /// Settle the slot with a failure.
    ///
    /// Returns `true` if this call won the settlement race.
    pub fn reject(&self, error: LoadError) -> bool {
        self.state.set(Err(error)).is_ok()
    }

    /// Create an already-rejected slot.
    pub fn rejected(error: LoadError) -> Self {
        let slot = Self::new();
        slot.reject(error);
        slot
    }

    /// Create an already-resolved slot.
    pub fn resolved(value: V) -> Self {
        let slot = Self::new();
        slot.resolve(value);
        slot
    }

    /// Whether the slot has settled.
    pub fn is_settled(&self) -> bool {
        self.state.get().is_some()
    }

    /// Borrow the settled outcome, if any.
    pub fn get(&self) -> Option<&LoadResult<V>> {
        self.state.get()
    }
}

impl<V: Clone> ResultSlot<V> {
    /// Clone out the settled outcome.
    ///
    /// An unsettled slot yields [`LoadError::NoResult`]. Callers normally
    /// never observe that sentinel; they block on the cache's settlement
    /// broadcast instead of reading eagerly.
    pub fn outcome(&self) -> LoadResult<V> {
        match self.state.get() {
            Some(outcome) => outcome.clone(),
            None => Err(LoadError::NoResult),
        }
    }
}

impl<V> Default for ResultSlot<V> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
