//! Exponential backoff policy

use common::constants::{DEFAULT_BACKOFF_START_MS, DEFAULT_MAX_RETRIES, MAX_BACKOFF_MS};
use std::time::Duration;

use super::error::HttpError;

/// Retry policy for a single logical request.
///
/// Only transport errors are retried. Status and decode errors come back on
/// the first occurrence with the status preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,
    /// Sleep after the first failed attempt
    pub backoff_start: Duration,
    /// Cap on a single sleep
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_start: Duration::from_millis(DEFAULT_BACKOFF_START_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Number of attempts actually made; at least one
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Sleep after the `failed_attempt`-th failure: `backoff_start * 2^(k-1)`, capped
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.backoff_start
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Whether `error` should trigger another attempt
    pub fn is_retryable(&self, error: &HttpError) -> bool {
        error.is_transport()
    }
}
