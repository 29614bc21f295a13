// src/api/retry.rs — Retry with exponential backoff for the conversation endpoints
//
// Wraps any CoachApi with automatic retry on transient failures.
// Retries: 429, 5xx, timeouts, connection failures.
// Does NOT retry: 4xx, not-found, decode errors, or opening the analysis
// stream (the server may already be running the job).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{AnalysisRequest, CoachApi};
use crate::engine::types::Message;
use crate::infra::config::RetrySettings;
use crate::infra::errors::CoachError;
use crate::infra::session::Session;
use crate::stream::ByteStream;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_retries: s.max_retries,
            initial_delay: Duration::from_millis(s.initial_delay_ms),
            backoff_factor: s.backoff_factor,
            max_delay: Duration::from_millis(s.max_delay_ms),
            jitter_fraction: s.jitter_fraction,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given retry attempt (0-indexed).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.jitter_fraction);
        let final_ms = (capped_ms * jitter).max(0.0);

        Duration::from_millis(final_ms as u64)
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in tests.
/// Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

/// A CoachApi wrapper that retries the non-streamed calls.
pub struct RetryingApi {
    inner: Arc<dyn CoachApi>,
    config: RetryConfig,
}

impl RetryingApi {
    pub fn new(inner: Arc<dyn CoachApi>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(inner: Arc<dyn CoachApi>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    async fn retrying<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T, CoachError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, CoachError>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retriable() && attempt < self.config.max_retries => {
                    let delay = self.config.delay_for_attempt(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        what,
                        attempt + 1,
                        self.config.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl CoachApi for RetryingApi {
    async fn open_analysis(&self, request: &AnalysisRequest) -> Result<ByteStream, CoachError> {
        self.inner.open_analysis(request).await
    }

    async fn list_conversations(&self) -> Result<Vec<Session>, CoachError> {
        self.retrying("list conversations", || self.inner.list_conversations())
            .await
    }

    async fn fetch_messages(&self, session_id: &str) -> Result<Vec<Message>, CoachError> {
        self.retrying("fetch messages", || self.inner.fetch_messages(session_id))
            .await
    }

    async fn delete_conversation(&self, session_id: &str) -> Result<(), CoachError> {
        self.retrying("delete conversation", || {
            self.inner.delete_conversation(session_id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyApi {
        failures_left: AtomicU32,
        calls: AtomicU32,
        error_status: u16,
    }

    impl FlakyApi {
        fn new(failures: u32, error_status: u16) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                error_status,
            }
        }

        fn next(&self) -> Result<(), CoachError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(CoachError::Http {
                    status: self.error_status,
                    message: "flaky".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CoachApi for FlakyApi {
        async fn open_analysis(&self, _r: &AnalysisRequest) -> Result<ByteStream, CoachError> {
            self.next()?;
            Ok(crate::stream::byte_stream_from_chunks(Vec::<&'static str>::new()))
        }
        async fn list_conversations(&self) -> Result<Vec<Session>, CoachError> {
            self.next().map(|_| Vec::new())
        }
        async fn fetch_messages(&self, _id: &str) -> Result<Vec<Message>, CoachError> {
            self.next().map(|_| Vec::new())
        }
        async fn delete_conversation(&self, _id: &str) -> Result<(), CoachError> {
            self.next()
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(5),
            jitter_fraction: 0.0,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let flaky = Arc::new(FlakyApi::new(2, 503));
        let api = RetryingApi::with_config(flaky.clone(), fast_config(3));
        assert!(api.list_conversations().await.is_ok());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let flaky = Arc::new(FlakyApi::new(10, 500));
        let api = RetryingApi::with_config(flaky.clone(), fast_config(2));
        assert!(api.delete_conversation("s-1").await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_not_retried() {
        let flaky = Arc::new(FlakyApi::new(1, 400));
        let api = RetryingApi::with_config(flaky.clone(), fast_config(3));
        assert!(api.fetch_messages("s-1").await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_analysis_never_retried() {
        let flaky = Arc::new(FlakyApi::new(1, 503));
        let api = RetryingApi::with_config(flaky.clone(), fast_config(3));
        let request = AnalysisRequest {
            message: "q".into(),
            session_id: "s".into(),
        };
        assert!(api.open_analysis(&request).await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(300),
            jitter_fraction: 0.0,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(300));
        assert_eq!(config.delay_for_attempt(6), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_bounds() {
        for attempt in 0..20 {
            let j = deterministic_jitter(attempt, 0.2);
            assert!((0.8..=1.2).contains(&j), "jitter {} out of range", j);
        }
    }

    #[test]
    fn test_from_settings() {
        let c = RetryConfig::from(&RetrySettings::default());
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.initial_delay, Duration::from_millis(500));
    }
}
