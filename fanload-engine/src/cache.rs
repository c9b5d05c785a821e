//! Key cache and waiter coordination.
//!
//! One shared map from key to its single-assignment slot, protected by a
//! mutex, plus a broadcast condition built on a `watch` channel carrying a
//! settlement generation counter. One settlement event (which may settle many
//! keys at once) wakes every waiter across every key; each waiter re-checks
//! its own predicate. This avoids a notification object per key at the cost
//! of waking unrelated waiters, which tolerate the extra wake cycles by
//! design.

use fanload_core::{FetchError, LoadError, LoadResult, ResultSlot};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Outcome of a cache lookup for one key.
#[derive(Debug)]
pub enum RequestState<V> {
    /// The key already settled; its outcome can be returned without blocking.
    Settled(LoadResult<V>),
    /// The key is known but not yet settled; the caller must await it.
    Pending,
    /// The key was unknown; an unsettled placeholder was inserted and exactly
    /// this caller is responsible for forwarding the key to the dispatcher.
    NeedsDispatch,
}

/// Shared key-to-slot mapping with settlement broadcast.
pub struct KeyCache<K, V> {
    slots: Mutex<HashMap<K, Arc<ResultSlot<V>>>>,
    /// Settlement generation. Bumped once per settlement event; waiters
    /// subscribe and re-check their key after every bump.
    generation: watch::Sender<u64>,
}

impl<K, V> KeyCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            slots: Mutex::new(HashMap::new()),
            generation,
        }
    }

    /// Look up a key, inserting an unsettled placeholder on first sight.
    pub fn request(&self, key: &K) -> RequestState<V> {
        let mut slots = self.lock();
        match slots.get(key) {
            Some(slot) => match slot.get() {
                Some(outcome) => RequestState::Settled(outcome.clone()),
                None => RequestState::Pending,
            },
            None => {
                slots.insert(key.clone(), Arc::new(ResultSlot::new()));
                RequestState::NeedsDispatch
            }
        }
    }

    /// Block until the key's slot settles, then return its outcome.
    ///
    /// Subscribes to the generation channel *before* the first predicate
    /// check: a settlement landing between the check and the wait is still
    /// observed, so no wakeup can be missed.
    pub async fn await_settled(&self, key: &K) -> LoadResult<V> {
        let mut generation = self.generation.subscribe();
        loop {
            if let Some(outcome) = self.settled_outcome(key) {
                return outcome;
            }
            if generation.changed().await.is_err() {
                // Generation sender dropped: the engine itself is gone.
                return Err(LoadError::Terminated);
            }
        }
    }

    /// Force-insert an already-resolved slot for `key` and broadcast.
    ///
    /// Replaces any existing entry, settled or not. Re-priming a settled key
    /// is the documented escape hatch for refreshing a value without a new
    /// engine instance.
    pub fn prime(&self, key: K, value: V) {
        {
            let mut slots = self.lock();
            slots.insert(key, Arc::new(ResultSlot::resolved(value)));
        }
        self.broadcast();
    }

    /// Apply one batch's outcome to every dispatched key, then broadcast.
    ///
    /// All per-key settlement happens under the cache lock as one critical
    /// section followed by a single broadcast, so waiters never observe a
    /// partially-applied batch. Keys missing from a successful mapping are
    /// rejected with `NotFound`; a wholesale fetch error rejects every key
    /// with the same `BatchFailed` reason. Settlement attempts against
    /// already-settled slots (e.g. after termination) are no-ops.
    pub fn settle_batch(&self, keys: &[K], outcome: Result<HashMap<K, V>, FetchError>) {
        {
            let slots = self.lock();
            match outcome {
                Ok(mut values) => {
                    for key in keys {
                        let Some(slot) = slots.get(key) else { continue };
                        match values.remove(key) {
                            Some(value) => {
                                slot.resolve(value);
                            }
                            None => {
                                slot.reject(LoadError::NotFound {
                                    key: format!("{key:?}"),
                                });
                            }
                        }
                    }
                }
                Err(err) => {
                    for key in keys {
                        if let Some(slot) = slots.get(key) {
                            slot.reject(LoadError::BatchFailed {
                                reason: err.reason.clone(),
                            });
                        }
                    }
                }
            }
        }
        self.broadcast();
    }

    /// Reject one key's slot, if present, and broadcast.
    ///
    /// Used when the dispatch hand-off fails after a placeholder was already
    /// inserted: the slot must settle or its waiters would block forever.
    pub fn reject_key(&self, key: &K, error: LoadError) {
        {
            let slots = self.lock();
            if let Some(slot) = slots.get(key) {
                slot.reject(error);
            }
        }
        self.broadcast();
    }

    /// Reject every unsettled slot plus any buffered keys not yet in the map,
    /// then broadcast once. The termination sweep.
    pub fn reject_all(&self, buffered: &[K], error: LoadError) {
        {
            let mut slots = self.lock();
            for key in buffered {
                slots
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(ResultSlot::new()));
            }
            for slot in slots.values() {
                slot.reject(error.clone());
            }
        }
        self.broadcast();
    }

    /// Number of known keys (settled or pending).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no keys.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn settled_outcome(&self, key: &K) -> Option<LoadResult<V>> {
        let slots = self.lock();
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    fn broadcast(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    // A poisoned lock still holds structurally valid state: slots settle via
    // their own single-assignment cell, never mid-mutation under this mutex.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<ResultSlot<V>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> Default for KeyCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
