//! Retry and timeout decorator for embedding providers.
//!
//! Wraps any provider with the transient-failure policy: each call gets a
//! timeout, transient failures (`Provider`, `Timeout`) are retried with
//! exponential backoff, and an exhausted budget surfaces as
//! `EmbeddingUnavailable` rather than an empty result. Non-transient
//! errors pass through untouched.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use docmind_core::{DocmindError, EmbeddingProvider, ProviderConfig, Result};

/// Decorates an inner provider with retries, backoff, and per-call
/// timeouts.
pub struct RetryingProvider<P> {
    inner: P,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
    timeout: Duration,
}

impl<P: EmbeddingProvider> RetryingProvider<P> {
    pub fn new(inner: P, config: &ProviderConfig) -> Self {
        Self {
            inner,
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_cap: Duration::from_millis(config.backoff_cap_ms),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    async fn attempt(&self, text: &str) -> Result<Vec<f32>> {
        match tokio::time::timeout(self.timeout, self.inner.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(DocmindError::Timeout {
                operation: "embed".to_string(),
                millis: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for RetryingProvider<P> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut backoff = self.backoff_base;
        let mut last_error: Option<DocmindError> = None;

        for attempt in 1..=self.max_attempts {
            match self.attempt(text).await {
                Ok(vector) => return Ok(vector),
                Err(err) if err.is_transient() => {
                    warn!(attempt, max = self.max_attempts, %err, "embedding attempt failed");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.backoff_cap);
            }
        }

        Err(DocmindError::EmbeddingUnavailable {
            attempts: self.max_attempts,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails transiently until `succeed_after` calls have been made.
    struct FlakyProvider {
        calls: Arc<AtomicU32>,
        succeed_after: u32,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.succeed_after {
                Err(DocmindError::provider("connection refused"))
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn fast_config(max_attempts: u32) -> ProviderConfig {
        ProviderConfig {
            max_attempts,
            backoff_base_ms: 0,
            backoff_cap_ms: 0,
            timeout_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = RetryingProvider::new(
            FlakyProvider {
                calls: calls.clone(),
                succeed_after: 2,
            },
            &fast_config(3),
        );

        let vector = provider.embed("text").await.unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unreachable_provider_surfaces_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = RetryingProvider::new(
            FlakyProvider {
                calls: calls.clone(),
                succeed_after: u32::MAX,
            },
            &fast_config(3),
        );

        let err = provider.embed("text").await.unwrap_err();
        assert!(matches!(err, DocmindError::EmbeddingUnavailable { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_error_not_retried() {
        struct Rejecting;

        #[async_trait]
        impl EmbeddingProvider for Rejecting {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(DocmindError::invalid_argument("text too long"))
            }

            fn dimension(&self) -> usize {
                2
            }
        }

        let provider = RetryingProvider::new(Rejecting, &fast_config(5));
        let err = provider.embed("text").await.unwrap_err();
        assert!(matches!(err, DocmindError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        struct Hanging;

        #[async_trait]
        impl EmbeddingProvider for Hanging {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(vec![0.0])
            }

            fn dimension(&self) -> usize {
                1
            }
        }

        let config = ProviderConfig {
            max_attempts: 2,
            backoff_base_ms: 0,
            backoff_cap_ms: 0,
            timeout_ms: 10,
        };
        let provider = RetryingProvider::new(Hanging, &config);
        let err = provider.embed("text").await.unwrap_err();
        assert!(matches!(err, DocmindError::EmbeddingUnavailable { attempts: 2, .. }));
    }
}
