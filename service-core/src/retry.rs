//! Bounded retry utilities for conflict-prone writes.
//!
//! Provides a retry combinator with a small randomized backoff. The caller
//! supplies the predicate deciding which errors are worth retrying; every
//! other error aborts immediately.

use crate::error::EngineError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the initial one.
    pub max_attempts: u32,
    /// Upper bound of the randomized backoff before each retry.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryConfig {
    /// Create a retry config with the specified attempt cap.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Randomized backoff in `0..=max_backoff`.
    fn backoff_duration(&self) -> Duration {
        let ceiling = self.max_backoff.as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=ceiling);
        Duration::from_millis(jitter)
    }
}

/// Execute an operation with bounded retry.
///
/// `f` is invoked up to `config.max_attempts` times. An error for which
/// `should_retry` returns `false` is returned as-is without further
/// attempts. When the attempt budget is exhausted the last error is
/// returned; the caller decides how to classify exhaustion.
pub async fn retry_on_conflict<F, Fut, T, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    f: F,
) -> Result<T, EngineError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
    P: Fn(&EngineError) -> bool,
{
    let mut attempt = 1;

    loop {
        match f(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !should_retry(&err) {
                    return Err(err);
                }

                if attempt >= config.max_attempts {
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Retry budget exhausted"
                    );
                    return Err(err);
                }

                let backoff = config.backoff_duration();
                warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Retryable conflict, backing off"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
