//! Transport retry bound with linear backoff.

use std::time::Duration;

/// How many times a transient transport failure is replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff_step * n`
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_step: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_step: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based)
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }

    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        self.backoff_step.saturating_mul(retry)
    }

    pub(crate) async fn wait(&self, retry: u32) {
        let delay = self.delay_before_retry(retry);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
