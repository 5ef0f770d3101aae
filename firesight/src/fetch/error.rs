//! Upstream fetch failure classes.

use thiserror::Error;

/// How a single fetch attempt against one layer failed.
///
/// Transient classes are worth retrying on the same layer; permanent
/// classes are not, but neither blocks falling through to the next
/// candidate layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// No response within the configured bound.
    #[error("timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Connection-level failure or unexpected upstream status.
    #[error("network error: {0}")]
    Network(String),

    /// Upstream asked us to slow down (HTTP 429).
    #[error("rate limited by upstream")]
    RateLimited,

    /// Upstream explicitly reports no imagery for this date/location.
    #[error("no imagery available upstream")]
    NotFound,

    /// A response arrived but is not a decodable image.
    #[error("response is not a valid image: {0}")]
    MalformedResponse(String),
}

impl FetchFailure {
    /// Whether retrying the same layer could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchFailure::Timeout { .. } | FetchFailure::Network(_) | FetchFailure::RateLimited
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classes() {
        assert!(FetchFailure::Timeout { timeout_secs: 30 }.is_transient());
        assert!(FetchFailure::Network("connection refused".into()).is_transient());
        assert!(FetchFailure::RateLimited.is_transient());
    }

    #[test]
    fn test_permanent_classes() {
        assert!(!FetchFailure::NotFound.is_transient());
        assert!(!FetchFailure::MalformedResponse("not an image".into()).is_transient());
    }
}
