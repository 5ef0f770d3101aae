//! Firesight - resilient satellite imagery retrieval and caching
//!
//! This library retrieves satellite snapshot imagery from NASA
//! Worldview-style WMS endpoints and keeps a bounded, persistent disk
//! cache in front of them. Transient upstream failures are retried
//! with exponential backoff, and when a layer stays unavailable the
//! request falls through an ordered chain of alternative layers before
//! giving up.
//!
//! # High-Level API
//!
//! Wire the pieces together once at startup, then issue requests:
//!
//! ```ignore
//! use std::sync::Arc;
//! use firesight::cache::DiskCacheStore;
//! use firesight::catalog::LayerCatalog;
//! use firesight::config::AppConfig;
//! use firesight::fetch::{HttpImageFetcher, ReqwestClient};
//! use firesight::orchestrator::FetchOrchestrator;
//!
//! let config = AppConfig::new(cache_dir);
//! let cache = Arc::new(
//!     DiskCacheStore::open(config.cache.directory.clone(), config.cache.max_size_bytes).await?,
//! );
//! let fetcher = Arc::new(HttpImageFetcher::new(
//!     ReqwestClient::new(config.fetch.fetch_timeout)?,
//!     config.fetch.fetch_timeout,
//! ));
//! let orchestrator =
//!     FetchOrchestrator::new(LayerCatalog::builtin(), cache, fetcher, &config.fetch);
//!
//! let image = orchestrator.fetch_image(&request).await?;
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod orchestrator;
pub mod request;

pub use cache::{CacheError, CacheKey, DiskCacheStore};
pub use catalog::{LayerCandidate, LayerCatalog, UnsupportedProductError};
pub use config::{AppConfig, CacheConfig, FetchConfig};
pub use fetch::{FetchFailure, HttpImageFetcher, ReqwestClient, RetryPolicy, UpstreamFetch};
pub use orchestrator::{FetchError, FetchExhaustedError, FetchOrchestrator};
pub use request::{ImageRequest, InvalidRequestError, Satellite};

/// Version of the Firesight library and CLI.
///
/// Synchronized across all components in the workspace; defined in
/// `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
