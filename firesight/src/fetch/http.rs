//! HTTP client abstraction for testability.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;

use super::error::FetchFailure;

/// Trait for async HTTP GET operations.
///
/// This abstraction allows for dependency injection and easier
/// testing by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Perform an HTTP GET request, classifying failures.
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes, FetchFailure>> + Send;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Create a client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, FetchFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchFailure::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// The configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify_status(status: StatusCode, url: &str) -> FetchFailure {
        match status {
            // GIBS answers 204 for dates/regions with no imagery
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => FetchFailure::NotFound,
            StatusCode::TOO_MANY_REQUESTS => FetchFailure::RateLimited,
            _ => FetchFailure::Network(format!("HTTP {} from {}", status, url)),
        }
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Bytes, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                FetchFailure::Network(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() || status == StatusCode::NO_CONTENT {
            return Err(Self::classify_status(status, url));
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchFailure::Network(format!("failed to read response: {}", e)))
    }
}
