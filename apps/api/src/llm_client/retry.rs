//! Retry policy for external model calls.

use std::time::Duration;

/// Bounded retry with exponential backoff.
///
/// `max_attempts` counts every call, including the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

/// Floor applied to every wait so a misconfigured policy never hammers the API.
const MIN_DELAY: Duration = Duration::from_millis(1);

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            ..Default::default()
        }
    }

    /// Delay to wait before retry number `retry` (1-based): 1s, 2s, 4s, ... capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self
            .initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay.max(self.initial_delay));
        delay.max(MIN_DELAY)
    }
}
