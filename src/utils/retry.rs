use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Linear Backoff Retry Strategy
// ============================================================================
//
// Retries an operation in place a bounded number of times. The wait before
// attempt n+1 is `n * backoff_unit`, so no single wait exceeds
// `max_attempts * backoff_unit`.
//
// No sleep happens after the final attempt.
//
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay multiplied by the attempt number between attempts
    pub backoff_unit: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts,
            backoff_unit,
        }
    }

    /// Delay to wait after `attempt` (1-based) failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

/// Result of a retry operation
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded on attempt `attempts`
    Success { value: T, attempts: u32 },
    /// Operation failed on every attempt
    Failed { error: E, attempts: u32 },
    /// Operation failed with an error retrying cannot fix
    PermanentFailure { error: E, attempts: u32 },
}

/// Check if an error is transient (should retry) or permanent (should not retry)
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Retry with transient error checking. `operation` receives the 1-based
/// attempt number.
pub async fn retry_on_transient<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        tracing::debug!(
            attempt = attempt,
            max_attempts = max_attempts,
            "Attempting operation"
        );

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Operation succeeded after retry");
                }
                return RetryResult::Success {
                    value,
                    attempts: attempt,
                };
            }
            Err(error) => {
                if !error.is_transient() {
                    tracing::error!(
                        attempt = attempt,
                        error = %error,
                        "Permanent failure detected, not retrying"
                    );
                    return RetryResult::PermanentFailure {
                        error,
                        attempts: attempt,
                    };
                }

                if attempt >= max_attempts {
                    tracing::error!(
                        attempt = attempt,
                        error = %error,
                        "Operation failed after all retries"
                    );
                    return RetryResult::Failed {
                        error,
                        attempts: attempt,
                    };
                }

                let delay = config.delay_after(attempt);
                tracing::warn!(
                    attempt = attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying after delay"
                );

                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[derive(Debug)]
    struct Flaky {
        transient: bool,
    }

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky (transient: {})", self.transient)
        }
    }

    impl IsTransient for Flaky {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn quick(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_delay_grows_linearly() {
        let config = RetryConfig::new(5, Duration::from_millis(250));
        assert_eq!(config.delay_after(1), Duration::from_millis(250));
        assert_eq!(config.delay_after(2), Duration::from_millis(500));
        assert_eq!(config.delay_after(4), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_on_transient(&quick(3), |_attempt| {
            let counter = counter_clone.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(Flaky { transient: true })
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert!(matches!(
            result,
            RetryResult::Success {
                value: "success",
                attempts: 3
            }
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_fails_after_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_on_transient(&quick(2), |_attempt| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Flaky { transient: true })
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Failed { attempts: 2, .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempt_numbers_are_one_based() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _ = retry_on_transient(&quick(3), |attempt| {
            seen_clone.lock().unwrap().push(attempt);
            async { Err::<(), _>(Flaky { transient: true }) }
        })
        .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_permanent_failure_stops_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_on_transient(&quick(5), |_attempt| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Flaky { transient: false })
            }
        })
        .await;

        assert!(matches!(result, RetryResult::PermanentFailure { attempts: 1, .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_use_every_attempt() {
        let result = retry_on_transient(&quick(4), |_attempt| async {
            Err::<(), _>(Flaky { transient: true })
        })
        .await;

        assert!(matches!(result, RetryResult::Failed { attempts: 4, .. }));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let result = retry_on_transient(&quick(0), |_attempt| async { Ok::<_, Flaky>(7) }).await;
        assert!(matches!(result, RetryResult::Success { value: 7, attempts: 1 }));
    }

    #[tokio::test]
    async fn test_no_sleep_after_final_attempt() {
        let config = RetryConfig::new(1, Duration::from_secs(30));
        let started = Instant::now();

        let result = retry_on_transient(&config, |_attempt| async { Err::<(), _>(Flaky { transient: true }) }).await;

        assert!(matches!(result, RetryResult::Failed { attempts: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
