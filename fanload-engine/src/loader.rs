//! Loader façade.
//!
//! The public entry point tying the pieces together: the key cache, the
//! lazily-started dispatch loop, the worker pool, and the termination
//! protocol. A `Loader` is cheaply clonable; all clones share one engine
//! instance and its cache.

use crate::cache::{KeyCache, RequestState};
use crate::dispatch::DispatchLoop;
use crate::fetcher::BatchFetcher;
use crate::metrics::{LoaderMetrics, MetricsSnapshot};
use fanload_core::{ConfigError, LoadError, LoadResult, LoaderConfig};
use futures_util::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, OnceCell};
use tokio::task::JoinHandle;

/// Request-batching and deduplicating loader.
///
/// Callers request values by key; keys arriving within the configured
/// debounce window (or up to the size cap) are coalesced into one invocation
/// of the injected [`BatchFetcher`], and per-key outcomes are cached for the
/// lifetime of the instance so a key is never fetched twice.
///
/// Values are cloned out of the cache for every waiter. For large values,
/// use `Arc<T>` as the value type; note that all callers of a key then share
/// the same allocation, and the engine does not isolate them from in-place
/// mutation behind interior mutability.
///
/// # Example
///
/// ```ignore
/// let loader = Loader::new(FetchFn::new(|keys: Vec<UserId>| async move {
///     fetch_users(&keys).await
/// }));
///
/// // These coalesce into one batched fetch.
/// let (alice, bob) = tokio::join!(loader.load(alice_id), loader.load(bob_id));
///
/// loader.terminate().await;
/// ```
pub struct Loader<K, V> {
    inner: Arc<LoaderInner<K, V>>,
}

struct LoaderInner<K, V> {
    cache: Arc<KeyCache<K, V>>,
    fetcher: Arc<dyn BatchFetcher<K, V>>,
    config: LoaderConfig,
    metrics: Arc<LoaderMetrics>,
    /// Termination signal. Monotonic: set to true at most once.
    shutdown_tx: watch::Sender<bool>,
    /// Lazily-initialized hand-off to the dispatch loop. Terminate "burns"
    /// this cell with a dead sender if the loop never started, so no
    /// background task can start afterwards.
    dispatch_tx: OnceCell<mpsc::UnboundedSender<K>>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> Loader<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a loader with default configuration.
    pub fn new(fetcher: impl BatchFetcher<K, V> + 'static) -> Self {
        Self::build(Arc::new(fetcher), LoaderConfig::default())
    }

    /// Create a loader with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration fails validation.
    pub fn with_config(
        fetcher: impl BatchFetcher<K, V> + 'static,
        config: LoaderConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(Arc::new(fetcher), config))
    }

    fn build(fetcher: Arc<dyn BatchFetcher<K, V>>, config: LoaderConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(LoaderInner {
                cache: Arc::new(KeyCache::new()),
                fetcher,
                config,
                metrics: Arc::new(LoaderMetrics::new()),
                shutdown_tx,
                dispatch_tx: OnceCell::new(),
                loop_handle: Mutex::new(None),
            }),
        }
    }

    /// Load the value for one key.
    ///
    /// The first caller to request an unseen key enqueues it for the next
    /// batch; every other caller piggybacks on the same pending slot. An
    /// already-settled key returns without blocking.
    pub async fn load(&self, key: K) -> LoadResult<V> {
        if self.is_terminated() {
            return Err(LoadError::Terminated);
        }

        match self.inner.cache.request(&key) {
            RequestState::Settled(outcome) => {
                self.inner.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
                outcome
            }
            RequestState::Pending => self.inner.cache.await_settled(&key).await,
            RequestState::NeedsDispatch => {
                let sender = self.dispatch_sender().await;
                if sender.send(key.clone()).is_err() {
                    // The loop is already gone; settle the placeholder we
                    // inserted instead of leaving its waiters blocked.
                    self.inner.cache.reject_key(&key, LoadError::Terminated);
                    return Err(LoadError::Terminated);
                }
                self.inner.cache.await_settled(&key).await
            }
        }
    }

    /// Load values for many keys, deduplicating and batching them together.
    ///
    /// Duplicate keys are requested once (stable first-occurrence order) and
    /// share one resolved value. Fail-fast: the first key-level error aborts
    /// the whole call and sibling successes are discarded.
    pub async fn load_many(&self, keys: &[K]) -> Result<HashMap<K, V>, LoadError> {
        let mut seen = HashSet::with_capacity(keys.len());
        let mut distinct = Vec::with_capacity(keys.len());
        for key in keys {
            if seen.insert(key.clone()) {
                distinct.push(key.clone());
            }
        }

        let values = try_join_all(distinct.iter().map(|key| self.load(key.clone()))).await?;
        Ok(distinct.into_iter().zip(values).collect())
    }

    /// Seed the cache with an already-resolved value, without a fetch.
    ///
    /// Replaces any existing entry for the key, settled or not, and wakes
    /// its waiters.
    pub fn prime(&self, key: K, value: V) {
        self.inner.metrics.keys_primed.fetch_add(1, Ordering::Relaxed);
        self.inner.cache.prime(key, value);
    }

    /// Shut the engine down.
    ///
    /// Idempotent and safe to call concurrently from multiple clones. Stops
    /// the dispatch loop, rejects every pending key with
    /// [`LoadError::Terminated`], and waits for background work to finish:
    /// after this returns no engine task remains and all pending and future
    /// loads fail with `Terminated`.
    pub async fn terminate(&self) {
        // Burn the lazy-start cell first so no dispatch loop can start after
        // this point; later sends fail and reject their key immediately.
        self.inner
            .dispatch_tx
            .get_or_init(|| async {
                let (tx, _) = mpsc::unbounded_channel();
                tx
            })
            .await;

        self.inner.shutdown_tx.send_replace(true);

        let mut handle = self.inner.loop_handle.lock().await;
        if let Some(handle) = handle.take() {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "dispatch loop task failed");
            }
            tracing::info!("loader terminated");
        }

        // Keys that raced termination and never reached the loop still hold
        // unsettled placeholders; sweep them.
        self.inner.cache.reject_all(&[], LoadError::Terminated);
    }

    /// Whether the engine has been terminated.
    pub fn is_terminated(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// Get a point-in-time snapshot of the loader's activity counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Hand-off sender to the dispatch loop, starting it on first use.
    async fn dispatch_sender(&self) -> mpsc::UnboundedSender<K> {
        self.inner
            .dispatch_tx
            .get_or_init(|| async {
                let (tx, rx) = mpsc::unbounded_channel();
                let dispatch = DispatchLoop::new(
                    Arc::clone(&self.inner.cache),
                    Arc::clone(&self.inner.fetcher),
                    Arc::clone(&self.inner.metrics),
                    self.inner.config.clone(),
                    rx,
                    self.inner.shutdown_tx.subscribe(),
                );
                let handle = tokio::spawn(dispatch.run());
                *self.inner.loop_handle.lock().await = Some(handle);
                tracing::info!(
                    window_ms = self.inner.config.batch_window.as_millis() as u64,
                    max_batch_size = self.inner.config.max_batch_size,
                    max_concurrent_batches = self.inner.config.max_concurrent_batches,
                    "loader started"
                );
                tx
            })
            .await
            .clone()
    }
}

// Manual impl: clones share the engine, no bounds on K/V needed.
impl<K, V> Clone for Loader<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
