//! Bounded exponential backoff for transient model failures

use crate::config::RetryConfig;
use crate::error::ModelError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Retries an operation while it fails transiently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` calls in total
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Total attempts allowed, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the `attempt`-th failure (1-based), doubling up to the cap
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `f` until it succeeds, fails permanently, or attempts run out
    ///
    /// `f` receives the 1-based attempt number. Returns the final result and
    /// the number of attempts made.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut f: F) -> (Result<T, ModelError>, u32)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        let mut attempt = 1;

        loop {
            match f(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempts = attempt, "Operation succeeded after retries");
                    }
                    return (Ok(value), attempt);
                }
                Err(e) if !e.is_transient() => {
                    warn!(operation, attempt, error = %e, "Permanent failure, not retrying");
                    return (Err(e), attempt);
                }
                Err(e) if attempt >= self.max_attempts => {
                    warn!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "Operation failed after max attempts"
                    );
                    return (Err(e), attempt);
                }
                Err(e) => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omx_domain::FailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> ModelError {
        ModelError {
            kind: FailureKind::Transient,
            message: "throttled".into(),
        }
    }

    fn permanent() -> ModelError {
        ModelError {
            kind: FailureKind::Permanent,
            message: "bad key".into(),
        }
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(8000));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let (result, attempts) = fast(3)
            .run("test", |_| async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_transient_exhausts_attempts() {
        let (result, attempts) = fast(3)
            .run("test", |_| async { Err::<(), _>(transient()) })
            .await;
        assert_eq!(result, Err(transient()));
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_permanent_not_retried() {
        let (result, attempts) = fast(5)
            .run("test", |_| async { Err::<(), _>(permanent()) })
            .await;
        assert_eq!(result, Err(permanent()));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_attempt_numbers_passed() {
        let seen = std::sync::Mutex::new(Vec::new());
        let _ = fast(3)
            .run("test", |attempt| {
                seen.lock().unwrap().push(attempt);
                async { Err::<(), _>(transient()) }
            })
            .await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_none_policy() {
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
    }
}
