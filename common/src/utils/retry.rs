use std::{future::Future, time::Duration};

use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::warn;

use crate::error::AppError;

/// Explicit retry policy applied around external generative calls.
///
/// Delays grow as `base_delay_ms^attempt` capped at `max_delay_ms`, with
/// jitter. Only quota-exhaustion failures are retried; anything else aborts
/// on the first attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 15_000,
        }
    }
}

impl RetryPolicy {
    fn strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(self.base_delay_ms)
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .map(jitter)
            .take(self.max_retries)
    }
}

/// Runs `action` under the policy, retrying only retryable failures.
pub async fn retry_generative<T, A, F>(policy: RetryPolicy, mut action: A) -> Result<T, AppError>
where
    A: FnMut() -> F,
    F: Future<Output = Result<T, AppError>>,
{
    RetryIf::spawn(
        policy.strategy(),
        || action(),
        |err: &AppError| {
            let retryable = err.is_retryable();
            if retryable {
                warn!(error = %err, "generative call hit quota limit; backing off");
            }
            retryable
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[tokio::test]
    async fn quota_failures_are_retried_until_success() {
        let attempts = AtomicUsize::new(0);
        let result = retry_generative(fast_policy(), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(AppError::QuotaExhausted("429".into()))
                } else {
                    Ok("answer".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "answer");
        // first call plus exactly two backed-off retries
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let attempts = AtomicUsize::new(0);
        let result: Result<String, AppError> = retry_generative(fast_policy(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::QuotaExhausted("429".into())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::QuotaExhausted(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unclassified_failures_abort_immediately() {
        let attempts = AtomicUsize::new(0);
        let result: Result<String, AppError> = retry_generative(fast_policy(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Generation("model unavailable".into())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::Generation(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
