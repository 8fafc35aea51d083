//! Fixed-delay retry for transient remote failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::RemoteError;
use crate::limiter::RateLimiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first included. Never zero.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, fails non-transiently, or the attempt
    /// budget is spent. Every attempt first waits on `limiter`.
    pub async fn run<T, F, Fut>(
        &self,
        limiter: &RateLimiter,
        label: &str,
        mut op: F,
    ) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            limiter.acquire().await;

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                return Err(RemoteError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            warn!(
                "{} failed (attempt {}/{}): {}, retrying in {:?}",
                label, attempt, self.max_attempts, err, self.delay
            );
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn limiter() -> RateLimiter {
        RateLimiter::new(1000.0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_uses_every_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let start = Instant::now();

        let err = policy
            .run(&limiter(), "optimal plan", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(RemoteError::Transient("503".into()))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            err,
            RemoteError::RetriesExhausted { attempts: 3, .. }
        ));
        // Two fixed delays between three attempts.
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::new(3, Duration::from_secs(5));

        let err = policy
            .run(&limiter(), "blueprint", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(RemoteError::NonTransient {
                    status: 400,
                    message: "bad request".into(),
                })
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, RemoteError::NonTransient { status: 400, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        let value = policy
            .run(&limiter(), "listing", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(RemoteError::Transient("timeout".into()))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
