//! Fixed-count, fixed-delay retry around market data calls.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::ProviderError;
use crate::error::PipelineError;

/// Retry policy for external calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts (at least one)
    pub max_retries: u32,
    /// Delay between attempts
    pub interval: Duration,
    /// Deadline for each attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, interval: Duration, timeout: Duration) -> Self {
        Self {
            max_retries,
            interval,
            timeout,
        }
    }

    /// Run `op` until it succeeds, a non-recoverable error occurs, or the
    /// attempts are exhausted. Failures surface as `DataUnavailable`.
    pub async fn run<T, F, Fut>(&self, symbol: &str, mut op: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let attempts = self.max_retries.max(1);
        let mut last_error = ProviderError::Timeout;

        for attempt in 1..=attempts {
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(r) => r,
                Err(_) => Err(ProviderError::Timeout),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_recoverable() => {
                    debug!(symbol, error = %e, "Non-recoverable data error, not retrying");
                    return Err(PipelineError::data_unavailable(symbol, e));
                }
                Err(e) => {
                    warn!(symbol, attempt, attempts, error = %e, "Data fetch failed");
                    last_error = e;
                    if attempt < attempts {
                        tokio::time::sleep(self.interval).await;
                    }
                }
            }
        }

        Err(PipelineError::data_unavailable(
            symbol,
            format!("{} (after {} attempts)", last_error, attempts),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("THYAO", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::Network("reset".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_data_unavailable() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(3)
            .run("THYAO", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::RateLimited) }
            })
            .await;
        assert!(matches!(result, Err(PipelineError::DataUnavailable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(5)
            .run("NOPE", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::NotFound("NOPE".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let policy = RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(20));
        let result: Result<(), _> = policy
            .run("SLOW", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        match result {
            Err(PipelineError::DataUnavailable { reason, .. }) => {
                assert!(reason.contains("timed out"))
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
