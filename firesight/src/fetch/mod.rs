//! Upstream fetching: HTTP seam, failure classes, retry policy.
//!
//! One fetch of one layer is the unit of work here. Everything above
//! (retry loops, layer fallback, caching) belongs to the
//! orchestrator; everything below (transport, status mapping) to the
//! HTTP client.

mod error;
mod fetcher;
mod http;
mod retry;

pub use error::FetchFailure;
pub use fetcher::{BoxFuture, HttpImageFetcher, UpstreamFetch};
pub use http::{AsyncHttpClient, ReqwestClient};
pub use retry::{RetryPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_MAX_ATTEMPTS};

#[cfg(test)]
pub use http::tests::MockHttpClient;
