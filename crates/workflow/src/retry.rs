//! Retry with exponential backoff for node operations.

use crate::error::Result;
use crate::node::RetryPolicy;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder, backoff::Backoff};
use monorel_release::WorkflowConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff timing between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay.
    pub max_backoff_ms: u64,
    /// Growth factor between delays.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Zero-delay retries, for tests.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
            multiplier: 1.0,
        }
    }
}

impl From<&WorkflowConfig> for RetryConfig {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            ..Self::default()
        }
    }
}

/// Result of a retried operation and how many attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    /// Final result.
    pub result: Result<T>,
    /// Attempts made, at least one.
    pub attempts: u32,
}

/// Run `f` until it succeeds or `policy` runs out of attempts.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    policy: RetryPolicy,
    operation_name: &str,
    mut f: F,
) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = create_backoff(config);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match f().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts, "Operation succeeded after retry"
                    );
                }
                return Attempted {
                    result: Ok(value),
                    attempts,
                };
            }
            Err(err) => {
                if attempts >= policy.max_attempts() {
                    warn!(
                        operation = operation_name,
                        attempts,
                        error = %err,
                        "Operation failed after maximum retries"
                    );
                    return Attempted {
                        result: Err(err),
                        attempts,
                    };
                }

                let Some(duration) = backoff.next_backoff() else {
                    return Attempted {
                        result: Err(err),
                        attempts,
                    };
                };
                warn!(
                    operation = operation_name,
                    attempts,
                    error = %err,
                    retry_in_ms = duration.as_millis(),
                    "Operation failed, retrying"
                );
                tokio::time::sleep(duration).await;
            }
        }
    }
}

fn create_backoff(config: &RetryConfig) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(config.initial_backoff_ms))
        .with_max_interval(Duration::from_millis(config.max_backoff_ms))
        .with_multiplier(config.multiplier)
        .with_randomization_factor(0.0)
        .with_max_elapsed_time(None) // bounded by the retry policy
        .build()
}
