//! Request throttling for the external model API.
//!
//! The generation client acquires a permit before every attempt. The default
//! backend is a governor GCRA limiter keyed on requests per minute; it is
//! shared by all runs in the process.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Waits until the next external call is allowed.
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn acquire(&self);
}

/// No limit. Used when `REQUESTS_PER_MINUTE=0` and in tests.
pub struct Unthrottled;

#[async_trait]
impl Throttle for Unthrottled {
    async fn acquire(&self) {}
}

/// Requests-per-minute limiter backed by governor.
pub struct RequestThrottle {
    limiter: DirectRateLimiter,
}

impl RequestThrottle {
    pub fn per_minute(requests_per_minute: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(requests_per_minute)),
        }
    }
}

#[async_trait]
impl Throttle for RequestThrottle {
    async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

/// Builds the process-wide throttle; `0` disables limiting.
pub fn from_requests_per_minute(requests_per_minute: u32) -> Arc<dyn Throttle> {
    match NonZeroU32::new(requests_per_minute) {
        Some(rpm) => Arc::new(RequestThrottle::per_minute(rpm)),
        None => Arc::new(Unthrottled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unthrottled_acquire_returns_immediately() {
        Unthrottled.acquire().await;
    }

    #[tokio::test]
    async fn test_first_request_passes_without_waiting() {
        let throttle = RequestThrottle::per_minute(NonZeroU32::new(30).unwrap());
        let waited = tokio::time::timeout(std::time::Duration::from_secs(1), throttle.acquire())
            .await;
        assert!(waited.is_ok(), "first permit should be granted immediately");
    }

    #[tokio::test]
    async fn test_second_request_waits_for_next_permit() {
        let throttle = RequestThrottle::per_minute(NonZeroU32::new(1).unwrap());
        throttle.acquire().await;
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(100), throttle.acquire()).await;
        assert!(waited.is_err(), "one request per minute must block the second call");
    }

    #[tokio::test]
    async fn test_zero_rpm_builds_unthrottled() {
        let throttle = from_requests_per_minute(0);
        throttle.acquire().await;
        throttle.acquire().await;
    }
}
