//! Dispatch loop and bounded batch-worker pool.
//!
//! One background task collects newly-seen keys and decides when to flush a
//! batch: either the debounce window elapses with no new arrivals, or the
//! buffer reaches the configured size cap (the size trigger preempts the
//! timer). Each new key pushes the flush deadline forward, so a burst of
//! requests inside the window lands in one batch while the loop never waits
//! longer than one window once traffic stops.
//!
//! Flushed batches run on worker tasks bounded by a counting semaphore.
//! A saturated pool backpressures collection: the loop awaits a permit
//! before spawning the next worker. Batches may complete out of submission
//! order; that is safe because every key settles at most once.

use crate::cache::KeyCache;
use crate::fetcher::BatchFetcher;
use crate::metrics::LoaderMetrics;
use fanload_core::{LoadError, LoaderConfig};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{self, Instant};

/// The background dispatcher. Built by the loader on first use and consumed
/// by [`run`](DispatchLoop::run) on its own task.
pub(crate) struct DispatchLoop<K, V> {
    cache: Arc<KeyCache<K, V>>,
    fetcher: Arc<dyn BatchFetcher<K, V>>,
    metrics: Arc<LoaderMetrics>,
    config: LoaderConfig,
    keys_rx: mpsc::UnboundedReceiver<K>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<K, V> DispatchLoop<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        cache: Arc<KeyCache<K, V>>,
        fetcher: Arc<dyn BatchFetcher<K, V>>,
        metrics: Arc<LoaderMetrics>,
        config: LoaderConfig,
        keys_rx: mpsc::UnboundedReceiver<K>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            metrics,
            config,
            keys_rx,
            shutdown_rx,
        }
    }

    /// Run the collect/flush state machine until termination.
    ///
    /// Exits on the shutdown signal or when every sender is gone (the loader
    /// was dropped without an explicit terminate). Either way the pending
    /// buffer and every unsettled slot are rejected with
    /// [`LoadError::Terminated`] and in-flight workers are drained before
    /// returning, so no waiter is left blocked and no task leaks.
    pub(crate) async fn run(self) {
        let Self {
            cache,
            fetcher,
            metrics,
            config,
            mut keys_rx,
            mut shutdown_rx,
        } = self;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_batches));
        let mut workers = JoinSet::new();
        let mut buffer: Vec<K> = Vec::new();
        // Only observed while the buffer is non-empty; re-armed on arrival.
        let mut deadline = Instant::now();

        tracing::debug!(
            window_ms = config.batch_window.as_millis() as u64,
            max_batch_size = config.max_batch_size,
            max_concurrent_batches = config.max_concurrent_batches,
            "dispatch loop started"
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = time::sleep_until(deadline), if !buffer.is_empty() => {
                    flush(&cache, &fetcher, &metrics, &semaphore, &mut buffer, &mut workers).await;
                }

                key = keys_rx.recv() => match key {
                    Some(key) => {
                        deadline = Instant::now() + config.batch_window;
                        buffer.push(key);
                        if config.max_batch_size > 0 && buffer.len() >= config.max_batch_size {
                            flush(&cache, &fetcher, &metrics, &semaphore, &mut buffer, &mut workers).await;
                        }
                    }
                    // Every loader handle dropped: nothing can wait on the
                    // buffered keys, clean up and exit.
                    None => break,
                },
            }
        }

        cache.reject_all(&buffer, LoadError::Terminated);

        // In-flight fetches run to completion; their settlement attempts
        // against the already-rejected slots are no-ops.
        while workers.join_next().await.is_some() {}

        tracing::debug!("dispatch loop stopped");
    }
}

/// Hand the buffered keys to a worker, bounded by the semaphore.
async fn flush<K, V>(
    cache: &Arc<KeyCache<K, V>>,
    fetcher: &Arc<dyn BatchFetcher<K, V>>,
    metrics: &Arc<LoaderMetrics>,
    semaphore: &Arc<Semaphore>,
    buffer: &mut Vec<K>,
    workers: &mut JoinSet<()>,
) where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // Guard against spurious empty flushes.
    if buffer.is_empty() {
        return;
    }
    let keys = std::mem::take(buffer);

    let permit = match Arc::clone(semaphore).acquire_owned().await {
        Ok(permit) => permit,
        // The semaphore is never closed; nothing to dispatch to if it were.
        Err(_) => return,
    };

    metrics.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    metrics
        .keys_fetched
        .fetch_add(keys.len() as u64, Ordering::Relaxed);
    tracing::debug!(keys = keys.len(), "dispatching batch");

    let cache = Arc::clone(cache);
    let fetcher = Arc::clone(fetcher);
    let metrics = Arc::clone(metrics);
    workers.spawn(async move {
        let outcome = fetcher.fetch(&keys).await;
        if let Err(err) = &outcome {
            metrics.fetch_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %err, keys = keys.len(), "batch fetch failed");
        }
        cache.settle_batch(&keys, outcome);
        drop(permit);
    });
}

// =============================================================================
// TESTS
// =============================================================================
