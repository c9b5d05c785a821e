//! Fanload Engine - Request Batching and Deduplication
//!
//! The "N+1 query" solver pattern: many concurrent callers request values by
//! key, the engine coalesces keys arriving within a short debounce window
//! (or once a size threshold is reached) into a single batched fetch, fans
//! the result back out to every waiting caller, and caches per-key outcomes
//! for the lifetime of the engine instance.
//!
//! The actual fetch is an injected dependency (see [`BatchFetcher`]); the
//! engine owns only the batching, caching and synchronization:
//!
//! - exactly-once resolution of each key, even under concurrent first-access
//!   races (see [`fanload_core::ResultSlot`]);
//! - no missed wakeups between waiters and the background dispatcher
//!   (see [`KeyCache`]);
//! - race-free shutdown that never leaves a waiter blocked
//!   (see [`Loader::terminate`]).

pub mod cache;
mod dispatch;
pub mod fetcher;
pub mod loader;
pub mod metrics;

pub use cache::{KeyCache, RequestState};
pub use fetcher::{BatchFetcher, FetchFn};
pub use loader::Loader;
pub use metrics::{LoaderMetrics, MetricsSnapshot};

// Re-export the core types callers need at the API surface.
pub use fanload_core::{ConfigError, FetchError, LoadError, LoadResult, LoaderConfig, ResultSlot};
