//! Fanload Core - Leaf Types
//!
//! Pure data types and leaf primitives for the fanload batching engine:
//! error enums, the single-assignment result slot, and configuration.
//! No background behavior lives here; the engine crate depends on this.

pub mod config;
pub mod error;
pub mod slot;

pub use config::{LoaderConfig, DEFAULT_BATCH_WINDOW, DEFAULT_MAX_CONCURRENT_BATCHES};
pub use error::{ConfigError, FetchError, LoadError, LoadResult};
pub use slot::ResultSlot;
