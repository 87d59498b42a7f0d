//! Retry policy for transient Firestore failures.
//!
//! Exponential backoff with full jitter; a server-provided delay on 429
//! takes precedence.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info_span, warn, Instrument};

use crate::error::FirestoreResult;
use crate::metrics::record_retry;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds).
    pub base_delay_ms: u64,
    /// Delay cap (milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
        if let Some(after) = retry_after_ms {
            return Duration::from_millis(after);
        }

        let capped = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);

        Duration::from_millis(jitter(capped).max(self.base_delay_ms))
    }
}

/// Uniform-ish value in `0..=upper` from the clock's sub-second nanos.
fn jitter(upper: u64) -> u64 {
    if upper == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    ((upper as f64) * ((nanos % 1000) as f64 / 1000.0)) as u64
}

/// Run `op`, retrying network errors, 429s and 5xx responses.
///
/// Client errors (4xx other than 429), auth failures and precondition
/// failures are returned immediately.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    op: F,
) -> FirestoreResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = FirestoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        let span = info_span!("firestore_retry", operation = %operation, attempt = attempt + 1);
        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.delay_for(attempt, e.retry_after_ms());
                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Firestore operation failed, retrying"
                );
                record_retry(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FirestoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[test]
    fn test_delay_honors_retry_after() {
        let delay = RetryConfig::default().delay_for(0, Some(2000));
        assert_eq!(delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_delay_bounds() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 2000,
        };
        let delay = config.delay_for(10, None);
        assert!(delay.as_millis() >= 1000);
        assert!(delay.as_millis() <= 2000);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "get_document", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FirestoreError::ServerError(503, "unavailable".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_errors() {
        let calls = AtomicU32::new(0);
        let result: FirestoreResult<()> = with_retry(&fast(), "get_document", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FirestoreError::not_found("users/u1"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: FirestoreResult<()> = with_retry(&fast(), "create_document", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FirestoreError::RateLimited(1))
        })
        .await;

        assert!(matches!(result, Err(FirestoreError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
