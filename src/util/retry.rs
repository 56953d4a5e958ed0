//! Retry with exponential backoff and jitter.
//!
//! Intended for idempotent operations at call sites; the request pipeline
//! itself never retries beyond its single refresh-and-reissue.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{normalize_error, AppError, ClientError, ErrorCode};
use crate::util::rand_factor;

/// Caller-supplied veto over retrying a particular error.
pub type RetryPredicate = Arc<dyn Fn(&AppError) -> bool + Send + Sync>;

/// Retry policy configuration.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,
    /// Initial backoff delay.
    pub initial_delay: Duration,
    /// Maximum backoff delay.
    pub max_delay: Duration,
    /// Errors this predicate rejects are rethrown without retrying, even
    /// when the taxonomy considers them retryable.
    pub should_retry: Option<RetryPredicate>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("should_retry", &self.should_retry.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            should_retry: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    pub fn with_should_retry(
        mut self,
        predicate: impl Fn(&AppError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Execute an async operation, retrying retryable failures.
    ///
    /// Each failure is normalized first; non-retryable errors (validation,
    /// auth, not-found) are rethrown immediately. Backoff doubles per
    /// attempt, capped at `max_delay`, with up to 30% added jitter.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> std::result::Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ClientError>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let error = normalize_error(e);
                    let vetoed = self
                        .should_retry
                        .as_ref()
                        .is_some_and(|predicate| !predicate(&error));
                    if vetoed || !error.is_retryable() || attempt >= self.max_retries {
                        return Err(error);
                    }

                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %error,
                        "Retrying after error"
                    );

                    let exponential = self.initial_delay.as_secs_f64() * 2f64.powi(attempt as i32);
                    let base = exponential.min(self.max_delay.as_secs_f64());
                    // Jitter: up to +30% of the base delay
                    let delay = base * (1.0 + rand_factor() * 0.3);
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;

                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::new(ErrorCode::InternalError, "retry budget exhausted")))
    }
}

/// Execute `operation` with the default policy (3 retries, 1s initial
/// delay, 10s cap).
pub async fn retry_with_backoff<F, Fut, T>(operation: F) -> std::result::Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, ClientError>>,
{
    RetryPolicy::new().execute(operation).await
}
