//! Per-layer retry policy.
//!
//! Controls whether a failed attempt against a layer is retried and
//! how long to back off first. The schedule is deterministic: with
//! the default 2s base, attempt 1 runs immediately, attempt 2 after
//! 2s, attempt 3 after 4s. Keeping it jitter-free keeps retry timing
//! directly testable.

use std::time::Duration;

use super::error::FetchFailure;

/// Default maximum attempts per layer (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default exponential backoff base.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Stateless retry decision function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with an explicit attempt cap and backoff base.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero.
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        assert!(max_attempts >= 1, "at least one attempt is required");
        Self {
            max_attempts,
            backoff_base,
        }
    }

    /// Whether attempt `attempt_number` (1-based) may be followed by
    /// another try on the same layer after failing with `failure`.
    ///
    /// Only transient failure classes are retried; permanent classes
    /// fall through to the next layer immediately.
    pub fn should_retry(&self, attempt_number: u32, failure: &FetchFailure) -> bool {
        attempt_number < self.max_attempts && failure.is_transient()
    }

    /// Delay before running attempt `attempt_number` (1-based).
    ///
    /// Attempt 1 is immediate; attempt n waits `base * 2^(n-2)`.
    pub fn backoff_delay(&self, attempt_number: u32) -> Duration {
        if attempt_number <= 1 {
            Duration::ZERO
        } else {
            self.backoff_base * 2u32.pow(attempt_number - 2)
        }
    }

    /// The attempt cap, including the initial attempt.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
