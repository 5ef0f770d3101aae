//! Construction-time configuration for the retrieval core.
//!
//! All tunables are supplied when the orchestrator and cache are
//! built; nothing reads ambient global state.

use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::{RetryPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_MAX_ATTEMPTS};

/// Default per-fetch timeout (seconds).
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default cap on concurrent upstream fetches.
///
/// Keeps the service well under Worldview's rate limits even when many
/// requests are in flight.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

/// Default disk cache bound (1 GiB).
pub const DEFAULT_CACHE_MAX_SIZE_BYTES: u64 = 1024 * 1024 * 1024;

/// Fetch/retry/concurrency tunables.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// Timeout applied to each individual fetch attempt.
    pub fetch_timeout: Duration,

    /// Maximum attempts per layer, including the first.
    pub max_attempts_per_layer: u32,

    /// Exponential backoff base between attempts on the same layer.
    pub backoff_base: Duration,

    /// Admission limit on concurrent upstream fetch attempts.
    pub max_concurrent_fetches: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_attempts_per_layer: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

impl FetchConfig {
    /// Set the per-fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the per-layer attempt cap.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts_per_layer = max_attempts;
        self
    }

    /// Set the backoff base.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the concurrent fetch limit.
    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit;
        self
    }

    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts_per_layer, self.backoff_base)
    }
}

/// Disk cache tunables.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Root directory for cached payloads.
    pub directory: PathBuf,

    /// Maximum occupied bytes before LRU eviction.
    pub max_size_bytes: u64,
}

impl CacheConfig {
    /// Create a cache config with the default size bound.
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            max_size_bytes: DEFAULT_CACHE_MAX_SIZE_BYTES,
        }
    }

    /// Set the cache size bound.
    pub fn with_max_size(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }
}

/// Top-level configuration combining cache and fetch settings.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Disk cache configuration.
    pub cache: CacheConfig,

    /// Fetch configuration.
    pub fetch: FetchConfig,
}

impl AppConfig {
    /// Create an application config with defaults rooted at
    /// `cache_dir`.
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache: CacheConfig::new(cache_dir),
            fetch: FetchConfig::default(),
        }
    }
}
