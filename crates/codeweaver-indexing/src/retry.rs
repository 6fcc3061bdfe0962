//! Exponential backoff for provider calls
//!
//! Every networked provider call goes through [`retry_with_backoff`]:
//! base delay 1 s, factor 2, cap 60 s, up to 5 retries by default (all
//! settable through [`RetryConfig`]). Non-retryable errors surface
//! immediately.

use std::future::Future;
use std::time::Duration;

use codeweaver_config::RetryConfig;
use codeweaver_providers::{ProviderError, ProviderResult};

fn delay_for_attempt(config: &RetryConfig, attempt: usize) -> Duration {
    let factor = u64::from(config.factor.max(1)).saturating_pow(attempt as u32);
    let millis = config.base_delay_ms.saturating_mul(factor);
    Duration::from_millis(millis.min(config.max_delay_ms))
}

/// Bound a provider call to a timeout. Timeouts surface as retryable
/// [`ProviderError::Timeout`] values, non-fatal at file granularity.
///
/// # Errors
///
/// Returns the inner error, or `Timeout` when the deadline passes first.
pub async fn with_timeout<T, Fut>(
    duration: Duration,
    operation: &str,
    future: Fut,
) -> ProviderResult<T>
where
    Fut: Future<Output = ProviderResult<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            operation: operation.to_string(),
            timeout_ms: duration.as_millis() as u64,
        }),
    }
}

/// Run an async provider operation with exponential backoff.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-retryable error immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut f: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut last_error: Option<ProviderError> = None;

    for attempt in 0..=config.max_attempts {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation, attempt, "Provider call recovered after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                let delay = delay_for_attempt(config, attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Provider call failed, backing off: {e}"
                );
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| ProviderError::Other(format!("{operation} failed"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            base_delay_ms: 1,
            factor: 2,
            max_delay_ms: 4,
            max_attempts: 3,
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let result = retry_with_backoff(&fast_retry(), "op", move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ProviderError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let result = retry_with_backoff(&fast_retry(), "op", move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ProviderError::Backend("flaky".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let result: ProviderResult<()> = retry_with_backoff(&fast_retry(), "op", || async {
            Err(ProviderError::RateLimited("slow down".to_string()))
        })
        .await;
        assert!(matches!(result, Err(ProviderError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let result: ProviderResult<()> = retry_with_backoff(&fast_retry(), "op", move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Configuration("bad id".to_string()))
            }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_growth_and_cap() {
        let config = RetryConfig {
            base_delay_ms: 1_000,
            factor: 2,
            max_delay_ms: 60_000,
            max_attempts: 5,
        };
        assert_eq!(delay_for_attempt(&config, 0), Duration::from_secs(1));
        assert_eq!(delay_for_attempt(&config, 1), Duration::from_secs(2));
        assert_eq!(delay_for_attempt(&config, 5), Duration::from_secs(32));
        assert_eq!(delay_for_attempt(&config, 10), Duration::from_secs(60));
    }
}
