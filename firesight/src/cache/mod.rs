//! Bounded, persistent image cache.
//!
//! Fetched images are cached on disk keyed by a digest of the request
//! parameters, with least-recently-used eviction keeping the store
//! under its configured byte bound. The store survives process
//! restarts; only the recency index lives in memory and is rebuilt
//! from a directory scan on startup.

mod key;
mod lru_index;
mod store;

pub use key::CacheKey;
pub use lru_index::{EntryMetadata, LruIndex, PopulateStats};
pub use store::{CacheError, DiskCacheStore};
