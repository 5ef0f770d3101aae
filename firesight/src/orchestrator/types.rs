//! Orchestrator result and error types.

use std::fmt;

use thiserror::Error;

use crate::catalog::UnsupportedProductError;
use crate::fetch::FetchFailure;
use crate::request::InvalidRequestError;

/// Terminal outcome of trying one candidate layer.
///
/// Transient, not persisted; kept only to diagnose exhausted requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerAttempt {
    /// Layer that was tried.
    pub layer_id: String,
    /// Attempts made against it (1..=max_attempts).
    pub attempts: u32,
    /// The failure that ended the layer's retry loop.
    pub failure: FetchFailure,
}

/// Every candidate layer was tried and failed.
///
/// Carries the per-layer failure history for diagnosis. Callers at
/// the API boundary should present this as "imagery not currently
/// available" rather than a server fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchExhaustedError {
    /// One terminal record per candidate layer, in catalog order.
    pub attempts: Vec<LayerAttempt>,
}

impl fmt::Display for FetchExhaustedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "all {} candidate layers exhausted:",
            self.attempts.len()
        )?;
        for attempt in &self.attempts {
            write!(
                f,
                " [{} after {} attempt(s): {}]",
                attempt.layer_id, attempt.attempts, attempt.failure
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for FetchExhaustedError {}

/// Errors crossing the core boundary from `fetch_image`.
///
/// Transient upstream failures never appear here; they are absorbed
/// by retries and layer fallback and only surface, aggregated, inside
/// [`FetchExhaustedError`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request parameters were invalid; rejected before any cache or
    /// network activity.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequestError),

    /// The satellite/product pair is not in the layer catalog.
    #[error(transparent)]
    UnsupportedProduct(#[from] UnsupportedProductError),

    /// Every candidate layer was tried and failed.
    #[error(transparent)]
    Exhausted(#[from] FetchExhaustedError),

    /// The request was cancelled before an image was obtained.
    #[error("request cancelled")]
    Cancelled,
}
