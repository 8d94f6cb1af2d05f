//! Bounded exponential backoff for provider and scorer calls
//!
//! Retries stay inside the enrichment coordinator; providers perform a
//! single attempt and only classify whether their failure is worth
//! retrying.

use lexideck_media::BuildConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first (1 = no retry)
    pub attempts: usize,
    pub base_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(build: &BuildConfig) -> Self {
        Self {
            attempts: build.retry_attempts.max(1),
            base_ms: build.retry_base_ms,
        }
    }

    /// No retries, for tests and dry runs
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_ms: 0,
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let ms = self
            .base_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(MAX_BACKOFF_MS);
        Duration::from_millis(ms)
    }

    /// Run `op` until it succeeds, returns a non-retryable error, or the
    /// attempt budget runs out
    pub async fn run<T, E, F, Fut, P>(&self, label: &str, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.attempts || !retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.backoff(attempt - 1);
                    warn!(
                        op = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(attempts: usize) -> RetryPolicy {
        RetryPolicy {
            attempts,
            base_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_success_needs_one_attempt() {
        let calls = AtomicUsize::new(0);
        let result: Result<i32, String> = fast(3)
            .run(
                "op",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(7) }
                },
                |_| true,
            )
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_retry_until_budget() {
        let calls = AtomicUsize::new(0);
        let result: Result<i32, String> = fast(3)
            .run(
                "op",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("timeout".to_string()) }
                },
                |_| true,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_does_not_retry() {
        let calls = AtomicUsize::new(0);
        let result: Result<i32, String> = fast(5)
            .run(
                "op",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("bad key".to_string()) }
                },
                |_| false,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicUsize::new(0);
        let result: Result<i32, String> = fast(3)
            .run(
                "op",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 1 {
                            Err("flaky".to_string())
                        } else {
                            Ok(42)
                        }
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            attempts: 50,
            base_ms: 500,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(40), Duration::from_millis(MAX_BACKOFF_MS));
    }
}
