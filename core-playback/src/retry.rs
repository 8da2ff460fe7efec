//! # Retry Policy
//!
//! Bounded exponential backoff for `play()`. The schedule is a pure function
//! of the retry number so it can be checked without any I/O; the manager
//! drives the loop and sleeps through the injected `Sleeper`.

use crate::config::RetryConfig;
use crate::error::PlaybackError;
use std::time::Duration;

/// Retry bound and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Maximum delay between retries
    pub max_backoff: Duration,
    /// Whether the final retry drops to the minimal bitrate tier
    pub minimal_on_final_retry: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            minimal_on_final_retry: config.minimal_on_final_retry,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `initial * 2^(retry-1)`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Whether another retry is allowed after `retries_done` retries.
    pub fn can_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Whether retry number `retry` is the last one.
    pub fn is_final_retry(&self, retry: u32) -> bool {
        retry == self.max_retries
    }

    /// Sum of every backoff in a fully exhausted schedule.
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries).map(|retry| self.backoff(retry)).sum()
    }
}

/// Bookkeeping for one `play()` invocation.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Attempts made so far, including the first
    pub attempts: u32,
    pub last_error: Option<PlaybackError>,
    /// Backoff slept so far
    pub total_backoff: Duration,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retries made so far (attempts after the first).
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn record_failure(&mut self, error: PlaybackError) {
        self.last_error = Some(error);
    }

    pub fn record_backoff(&mut self, delay: Duration) {
        self.total_backoff += delay;
    }
}
