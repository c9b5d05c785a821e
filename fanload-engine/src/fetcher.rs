//! The injected batch-fetch seam.
//!
//! The engine never performs I/O itself; callers supply a [`BatchFetcher`]
//! that maps a set of distinct keys to their values in one round trip. This
//! is the only external dependency the engine takes.

use async_trait::async_trait;
use fanload_core::FetchError;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// Batch-fetch operation supplied by the caller.
///
/// Implementations must be thread-safe (Send + Sync); the engine invokes
/// `fetch` from background worker tasks, up to the configured concurrency
/// cap at a time.
///
/// # Contract
///
/// * The returned mapping may be partial: keys absent from it are reported
///   to their waiters as `LoadError::NotFound`.
/// * A returned `FetchError` fails the whole batch: every key in `keys` is
///   reported as `LoadError::BatchFailed` with the same reason.
/// * `keys` is always non-empty and free of duplicates.
#[async_trait]
pub trait BatchFetcher<K, V>: Send + Sync {
    /// Fetch values for a batch of distinct keys.
    async fn fetch(&self, keys: &[K]) -> Result<HashMap<K, V>, FetchError>;
}

/// A shared fetcher is a fetcher. Lets callers hold on to their own handle
/// (for inspection, pooling) while handing a clone to the loader.
#[async_trait]
impl<K, V, T> BatchFetcher<K, V> for Arc<T>
where
    K: Sync,
    T: BatchFetcher<K, V> + ?Sized,
{
    async fn fetch(&self, keys: &[K]) -> Result<HashMap<K, V>, FetchError> {
        (**self).fetch(keys).await
    }
}

/// Adapter turning an async closure into a [`BatchFetcher`].
///
/// # Example
///
/// ```ignore
/// let fetcher = FetchFn::new(|keys: Vec<UserId>| async move {
///     let users = db.users_by_ids(&keys).await.map_err(FetchError::new)?;
///     Ok(users.into_iter().map(|u| (u.id, u)).collect())
/// });
/// let loader = Loader::new(fetcher);
/// ```
pub struct FetchFn<F> {
    f: F,
}

impl<F> FetchFn<F> {
    /// Wrap a closure as a batch fetcher.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<K, V, F, Fut> BatchFetcher<K, V> for FetchFn<F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(Vec<K>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HashMap<K, V>, FetchError>> + Send,
{
    async fn fetch(&self, keys: &[K]) -> Result<HashMap<K, V>, FetchError> {
        (self.f)(keys.to_vec()).await
    }
}
