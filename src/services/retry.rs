// src/services/retry.rs
// DOCUMENTATION: Exponential backoff for outbound calls
// PURPOSE: Retry transient upstream failures (blob storage, postcodes.io)

use crate::errors::FarmError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Backoff parameters
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Third-party HTTP APIs
    pub const API: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
    };

    /// Calls made while a user waits on the response
    pub const QUICK: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
    };

    /// Delay before retry number `attempt` (0-based)
    /// DOCUMENTATION: min(base * 2^attempt, max), then +/- 25% jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exp = base_ms * 2f64.powi(attempt.min(30) as i32);
        let capped = exp.min(max_ms);

        let jitter = capped * 0.25 * rand::thread_rng().gen_range(-1.0..=1.0);
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error,
/// or the attempts run out
pub async fn retry_async<F, Fut, T>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, FarmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FarmError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    log::debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff_delay(attempt);
                log::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {}ms",
                    operation_name,
                    attempt + 1,
                    policy.max_attempts,
                    err,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_retryable() {
                    log::error!(
                        "{} failed after {} attempts: {}",
                        operation_name,
                        attempt + 1,
                        err
                    );
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const INSTANT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    };

    #[test]
    fn test_backoff_is_capped_and_jittered() {
        let policy = RetryPolicy::API;
        for attempt in 0..10 {
            let delay = policy.backoff_delay(attempt).as_millis() as f64;
            let expected = (1000.0 * 2f64.powi(attempt as i32)).min(30_000.0);
            assert!(delay >= expected * 0.75 - 1.0, "attempt {}: {}", attempt, delay);
            assert!(delay <= expected * 1.25 + 1.0, "attempt {}: {}", attempt, delay);
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = retry_async(INSTANT, "flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FarmError::ExternalApiError("503".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_async(INSTANT, "down", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FarmError::ServiceUnavailable("blob".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = tokio_test::block_on(retry_async(INSTANT, "missing", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FarmError::NotFound("postcode".into())) }
        }));

        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, FarmError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
