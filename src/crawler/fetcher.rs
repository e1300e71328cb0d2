//! Retrying wrapper over a raw page-fetch capability.
//!
//! Transient responses (rate limit, service unavailable, network failure)
//! are retried after a fixed delay. The upstream throttle advertises an
//! approximate fixed cooldown, so the delay does not grow. The final
//! attempt's result is returned as-is even when still failing; the caller
//! interprets failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::FetchSettings;

/// Network-failure sentinel status. Sits in the retryable set alongside
/// real HTTP codes.
pub const STATUS_NETWORK_ERROR: u16 = 0;

/// Result of fetching one page.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub success: bool,
    /// HTTP status, or 0 for a network-level failure.
    pub status: u16,
    pub body: Option<String>,
    pub error: Option<String>,
}

impl FetchResult {
    pub fn ok(status: u16, body: String) -> Self {
        Self {
            success: true,
            status,
            body: Some(body),
            error: None,
        }
    }

    pub fn failed(status: u16, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status,
            body: None,
            error: Some(error.into()),
        }
    }
}

/// A single-page fetch capability. Production implementation is the
/// reqwest-backed client in `scrapers::http_client`; tests use scripted
/// fakes.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult;
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for Arc<F> {
    async fn fetch(&self, url: &str) -> FetchResult {
        (**self).fetch(url).await
    }
}

/// Retry policy for the crawl fetch layer.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts (1 initial + `max_retries - 1` retries).
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Status codes considered transient. 0 is the network-error sentinel.
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_settings(&FetchSettings::default())
    }
}

impl RetryConfig {
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            retryable_status_codes: settings.retryable_status_codes.clone(),
        }
    }
}

/// Wraps a [`PageFetcher`] with bounded fixed-delay retry on transient
/// failures.
pub struct RetryingFetcher<F> {
    inner: F,
    config: RetryConfig,
}

impl<F: PageFetcher> RetryingFetcher<F> {
    pub fn new(inner: F, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for RetryingFetcher<F> {
    async fn fetch(&self, url: &str) -> FetchResult {
        let mut attempt = 0;
        let mut last = self.inner.fetch(url).await;

        while attempt + 1 < self.config.max_retries {
            if last.success || !self.config.retryable_status_codes.contains(&last.status) {
                return last;
            }

            attempt += 1;
            info!(
                "Retry {}/{} after {:?} (status: {})",
                attempt,
                self.config.max_retries - 1,
                self.config.retry_delay,
                last.status
            );
            tokio::time::sleep(self.config.retry_delay).await;
            last = self.inner.fetch(url).await;
        }

        last
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Fetcher returning a scripted sequence of results.
    struct ScriptedFetcher {
        results: Mutex<Vec<FetchResult>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(results: Vec<FetchResult>) -> Self {
            Self {
                results: Mutex::new(results),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> FetchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().unwrap();
            if results.len() > 1 {
                results.remove(0)
            } else {
                results[0].clone()
            }
        }
    }

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            retry_delay: Duration::from_millis(1),
            retryable_status_codes: vec![429, 503, 0],
        }
    }

    #[tokio::test]
    async fn success_after_two_transient_failures() {
        let fetcher = RetryingFetcher::new(
            ScriptedFetcher::new(vec![
                FetchResult::failed(429, "throttled"),
                FetchResult::failed(503, "unavailable"),
                FetchResult::ok(200, "<html/>".to_string()),
            ]),
            fast_config(),
        );

        let result = fetcher.fetch("http://example.test/").await;
        assert!(result.success);
        assert_eq!(fetcher.inner.call_count(), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let fetcher = RetryingFetcher::new(
            ScriptedFetcher::new(vec![FetchResult::failed(404, "not found")]),
            fast_config(),
        );

        let result = fetcher.fetch("http://example.test/").await;
        assert!(!result.success);
        assert_eq!(result.status, 404);
        assert_eq!(fetcher.inner.call_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_failure() {
        let fetcher = RetryingFetcher::new(
            ScriptedFetcher::new(vec![FetchResult::failed(429, "throttled")]),
            fast_config(),
        );

        let result = fetcher.fetch("http://example.test/").await;
        assert!(!result.success);
        assert_eq!(result.status, 429);
        // 1 initial + 2 retries
        assert_eq!(fetcher.inner.call_count(), 3);
    }

    #[tokio::test]
    async fn network_error_sentinel_is_retried() {
        let fetcher = RetryingFetcher::new(
            ScriptedFetcher::new(vec![
                FetchResult::failed(STATUS_NETWORK_ERROR, "connection reset"),
                FetchResult::ok(200, "ok".to_string()),
            ]),
            fast_config(),
        );

        let result = fetcher.fetch("http://example.test/").await;
        assert!(result.success);
        assert_eq!(fetcher.inner.call_count(), 2);
    }
}
