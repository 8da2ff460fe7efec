//! Backoff Timer
//!
//! Retry loops suspend through [`Sleeper`] instead of calling the runtime
//! timer, so a test can substitute one that records each requested delay.

use async_trait::async_trait;
use std::time::Duration;

/// Suspension source for retry backoff.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] on the Tokio timer. Follows a paused test clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
