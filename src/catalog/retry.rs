//! Retry timing for per-item detail fetches
//!
//! Exponential backoff with additive jitter, plus the small random delay
//! applied before the first attempt so that a burst of resolutions does not
//! hit the service at the same instant.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::infrastructure::config::defaults;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry (ms)
    pub base_delay_ms: u64,
    /// Upper bound for the exponential part (ms)
    pub max_delay_ms: u64,
    /// Backoff multiplier (2.0 = doubling)
    pub backoff_multiplier: f64,
    /// Random jitter added to each retry delay, `0..=jitter_range_ms`
    pub jitter_range_ms: u64,
    /// Random delay before the first attempt, `0..=prefetch_jitter_ms`
    pub prefetch_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::DETAIL_MAX_RETRIES,
            base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_delay_ms: defaults::RETRY_MAX_DELAY_MS,
            backoff_multiplier: defaults::RETRY_BACKOFF_MULTIPLIER,
            jitter_range_ms: defaults::RETRY_JITTER_MS,
            prefetch_jitter_ms: defaults::PREFETCH_JITTER_MS,
        }
    }
}

impl RetryPolicy {
    /// Policy without any randomness, for deterministic schedules.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter_range_ms = 0;
        self.prefetch_jitter_ms = 0;
        self
    }

    #[must_use]
    pub const fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Exponential part of the delay before retry number `retry` (1-based),
    /// capped at `max_delay_ms`.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let exponential = (self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent)) as u64;
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }

    /// Full delay before retry number `retry`: backoff plus random jitter.
    #[must_use]
    pub fn retry_delay(&self, retry: u32) -> Duration {
        self.backoff(retry) + Duration::from_millis(fastrand::u64(0..=self.jitter_range_ms))
    }

    /// Random delay applied before the first attempt.
    #[must_use]
    pub fn prefetch_delay(&self) -> Duration {
        Duration::from_millis(fastrand::u64(0..=self.prefetch_jitter_ms))
    }
}
