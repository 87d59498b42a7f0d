//! Retry with exponential backoff and per-attempt timeouts.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles on each further failure.
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Each attempt is abandoned after this long.
    pub attempt_timeout: Option<Duration>,
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            attempt_timeout: None,
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Wait after failed attempt `attempt` (1-based): `min(base * 2^(attempt-1), max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Why one attempt failed.
#[derive(Debug)]
pub enum AttemptError<E> {
    Failed(E),
    TimedOut(Duration),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Failed(e) => write!(f, "{e}"),
            AttemptError::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs()),
        }
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success { value: T, attempts: u32 },
    Failed { error: AttemptError<E>, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. } | RetryResult::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The value, dropping the failure detail.
    pub fn ok(self) -> Option<T> {
        match self {
            RetryResult::Success { value, .. } => Some(value),
            RetryResult::Failed { .. } => None,
        }
    }
}

/// Run `operation` until it succeeds or attempts run out.
///
/// `on_attempt` sees the 1-based attempt number and whether it succeeded.
pub async fn retry_async<F, Fut, T, E, A>(
    config: &RetryConfig,
    operation: F,
    on_attempt: A,
) -> RetryResult<T, E>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    A: Fn(u32, bool),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        let outcome = match config.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, operation(attempt)).await {
                Ok(result) => result.map_err(AttemptError::Failed),
                Err(_) => Err(AttemptError::TimedOut(limit)),
            },
            None => operation(attempt).await.map_err(AttemptError::Failed),
        };
        on_attempt(attempt, outcome.is_ok());

        match outcome {
            Ok(value) => {
                return RetryResult::Success {
                    value,
                    attempts: attempt,
                }
            }
            Err(e) if attempt < max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                debug!(
                    "{} attempt {}/{} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    "{} failed after {} attempts: {}",
                    config.operation_name, attempt, e
                );
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt,
                };
            }
        }
    }
}
