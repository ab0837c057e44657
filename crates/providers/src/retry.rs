//! Retrying provider wrapper.
//!
//! Transient oracle failures (rate limits, network errors, timeouts, 5xx)
//! are retried with exponential backoff. Everything else is returned as-is.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use taskloom_core::error::ProviderError;
use taskloom_core::provider::*;
use tracing::{info, warn};

/// A provider that retries another provider on transient failure.
pub struct RetryProvider {
    inner: Arc<dyn taskloom_core::Provider>,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryProvider {
    /// Wrap `inner` with the default policy: 6 attempts, 1s doubling up to 60s.
    pub fn new(inner: Arc<dyn taskloom_core::Provider>) -> Self {
        Self {
            inner,
            max_attempts: 6,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    fn is_transient(err: &ProviderError) -> bool {
        match err {
            ProviderError::RateLimited { .. }
            | ProviderError::Network(_)
            | ProviderError::Timeout(_) => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            ProviderError::AuthenticationFailed(_) | ProviderError::NotConfigured(_) => false,
        }
    }

    fn delay_for(&self, attempt: u32, err: &ProviderError) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max_delay);
        match err {
            ProviderError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs).min(self.max_delay))
            }
            _ => backoff,
        }
    }
}

#[async_trait]
impl taskloom_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.max_attempts && Self::is_transient(&e) => {
                    let delay = self.delay_for(attempt, &e);
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), attempt, "Giving up on provider");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use taskloom_core::Provider;

    struct FlakyProvider {
        failures: Mutex<Vec<ProviderError>>,
        calls: AtomicU32,
    }

    impl FlakyProvider {
        fn new(failures: Vec<ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                failures: Mutex::new(failures),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok(ProviderResponse::text("ok"))
            } else {
                Err(failures.remove(0))
            }
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest::new("m", vec![])
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let flaky = FlakyProvider::new(vec![
            ProviderError::Network("reset".into()),
            ProviderError::ApiError {
                status_code: 503,
                message: "busy".into(),
            },
        ]);
        let retry = RetryProvider::new(flaky.clone());
        let resp = retry.complete(request()).await.unwrap();
        assert_eq!(resp.content.as_deref(), Some("ok"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_is_not_retried() {
        let flaky = FlakyProvider::new(vec![ProviderError::AuthenticationFailed("bad".into())]);
        let retry = RetryProvider::new(flaky.clone());
        assert!(retry.complete(request()).await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let failures = (0..10).map(|_| ProviderError::Timeout("slow".into())).collect();
        let flaky = FlakyProvider::new(failures);
        let retry = RetryProvider::new(flaky.clone()).with_max_attempts(3);
        assert!(matches!(
            retry.complete(request()).await,
            Err(ProviderError::Timeout(_))
        ));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = RetryProvider::new(FlakyProvider::new(vec![]));
        let err = ProviderError::Network("x".into());
        assert_eq!(retry.delay_for(1, &err), Duration::from_secs(1));
        assert_eq!(retry.delay_for(3, &err), Duration::from_secs(4));
        assert_eq!(retry.delay_for(10, &err), Duration::from_secs(60));

        let limited = ProviderError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(retry.delay_for(1, &limited), Duration::from_secs(30));
    }
}
