use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Returned once every attempt has failed.
#[derive(Error, Debug)]
#[error("after {attempts} attempts, last error: {last}")]
pub struct RetryError<E: std::error::Error> {
    pub attempts: u32,
    pub last: E,
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Runs `op` until it succeeds or the attempt budget is spent.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_while(op, |_| true).await
    }

    /// Like [`run`](Self::run), but stops early on an error `retryable` rejects.
    /// An early stop still reports the attempts made so far.
    pub async fn run_while<T, E, F, Fut, P>(
        &self,
        mut op: F,
        retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= self.max_attempts || !retryable(&err) {
                return Err(RetryError {
                    attempts: attempt,
                    last: err,
                });
            }

            tokio::time::sleep(self.backoff).await;
            debug!("retrying after error:{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::client::StoreError;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_after_k_failures() {
        let calls = AtomicU32::new(0);
        let k = 2;
        let result = policy(5)
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < k {
                    Err(StoreError::Transient("throttled".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), k);
        assert_eq!(calls.load(Ordering::SeqCst), k + 1);
    }

    #[tokio::test]
    async fn exhausts_budget_and_reports_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(3)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Transient("unreachable".into()))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(
            err.to_string(),
            "after 3 attempts, last error: Store error: unreachable"
        );
    }

    #[tokio::test]
    async fn condition_failure_consumes_attempts_like_any_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(2)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::ConditionFailed("age > 0".into()))
            })
            .await;

        assert!(result.unwrap_err().last.is_condition_failed());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_while_stops_on_rejected_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(4)
            .run_while(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(StoreError::ConditionFailed("version = 1".into()))
                },
                |e: &StoreError| !e.is_condition_failed(),
            )
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_attempts_still_calls_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
