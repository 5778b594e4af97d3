use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::RemoteError;

/// Decides whether and when a failed remote attempt is retried.
///
/// `attempt` is 1-based: the number of the attempt that just failed.
pub trait RetryStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn max_attempts(&self) -> u32;
    fn next_delay(&self, attempt: u32, error: &RemoteError) -> Option<Duration>;
    fn should_retry(&self, attempt: u32, error: &RemoteError) -> bool {
        attempt < self.max_attempts() && !self.is_fatal_error(error)
    }
    fn is_fatal_error(&self, error: &RemoteError) -> bool {
        !error.is_retryable()
    }
}

/// `initial_delay * 2^(attempt-1) + uniform[0, jitter_max)`.
pub struct ExponentialBackoff {
    config: RetryConfig,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = 1u64 << attempt.saturating_sub(1).min(30);
        Duration::from_millis(self.config.initial_delay_ms.saturating_mul(exp))
    }

    fn jitter(&self) -> Duration {
        if self.config.jitter_max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..self.config.jitter_max_ms))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_retries.max(1)
    }

    fn next_delay(&self, attempt: u32, _error: &RemoteError) -> Option<Duration> {
        if attempt >= self.max_attempts() {
            return None;
        }
        Some(self.base_delay(attempt) + self.jitter())
    }
}
