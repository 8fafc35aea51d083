//! Client-side call rate ceiling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

use costplan_core::{Error, Result};

/// Spaces calls at least `1 / calls_per_second` apart.
///
/// Clones share state, so one limiter can gate any number of callers.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(calls_per_second: f64) -> Result<Self> {
        if !calls_per_second.is_finite() || calls_per_second <= 0.0 {
            return Err(Error::Config(format!(
                "rate limit must be a positive number of calls per second, got {}",
                calls_per_second
            )));
        }
        Ok(Self {
            interval: Duration::from_secs_f64(1.0 / calls_per_second),
            last_call: Arc::new(Mutex::new(None)),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next call may be issued. The first call passes
    /// immediately.
    pub async fn acquire(&self) {
        // Held across the sleep so concurrent callers queue in order.
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let ready_at = last + self.interval;
            if ready_at > Instant::now() {
                trace!("Rate limiter sleeping {:?}", ready_at - Instant::now());
                sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_rates() {
        assert!(RateLimiter::new(0.0).is_err());
        assert!(RateLimiter::new(-1.0).is_err());
        assert!(RateLimiter::new(f64::NAN).is_err());
        assert!(RateLimiter::new(f64::INFINITY).is_err());
        assert_eq!(
            RateLimiter::new(4.0).unwrap().interval(),
            Duration::from_millis(250)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_not_delayed() {
        let limiter = RateLimiter::new(0.5).unwrap();
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced() {
        let limiter = RateLimiter::new(2.0).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // Four gaps of 500ms after the free first call.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_residual_is_slept() {
        let limiter = RateLimiter::new(1.0).unwrap();
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(700)).await;

        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_the_ceiling() {
        let limiter = RateLimiter::new(1.0).unwrap();
        let other = limiter.clone();
        let start = Instant::now();
        limiter.acquire().await;
        other.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }
}
