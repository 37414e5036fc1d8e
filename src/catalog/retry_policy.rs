//! Retry policy for catalog calls.
//!
//! Implements exponential backoff with configurable parameters.

use crate::catalog::CatalogError;
use crate::config::CatalogSettings;
use std::time::Duration;

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds (cap for exponential growth).
    pub max_backoff_ms: u64,
    /// Multiplier applied to backoff after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Create a new RetryPolicy from configuration settings.
    pub fn new(config: &CatalogSettings) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            backoff_multiplier: config.backoff_multiplier,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Check if an error should be retried given the current retry count.
    pub fn should_retry(&self, error: &CatalogError, retry_count: u32) -> bool {
        error.is_retryable() && retry_count < self.max_retries
    }

    /// Backoff before retry number `retry_count` (0-based):
    /// `initial_backoff * multiplier^retry_count`, capped at `max_backoff_ms`.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let backoff =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(retry_count as i32);
        Duration::from_millis(backoff.min(self.max_backoff_ms as f64) as u64)
    }

    /// Delay before the next attempt, honouring a server provided
    /// `Retry-After` on rate limiting (still capped).
    pub fn delay_for(&self, error: &CatalogError, retry_count: u32) -> Duration {
        match error {
            CatalogError::RateLimited {
                retry_after_secs: Some(secs),
            } => Duration::from_secs(*secs).min(Duration::from_millis(self.max_backoff_ms)),
            _ => self.backoff(retry_count),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}
