//! Reqwest-backed page fetcher with a fixed politeness delay.
//!
//! One request is in flight at a time by construction; the crawl loop is
//! sequential and this client additionally spaces successive requests by a
//! fixed delay to respect the upstream site.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::debug;

use crate::crawler::{FetchResult, PageFetcher};

const USER_AGENT: &str = concat!("glamscrape/", env!("CARGO_PKG_VERSION"));

pub struct HttpPageFetcher {
    client: Client,
    request_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration, request_delay: Duration) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            request_delay,
            last_request: Mutex::new(None),
        }
    }

    /// Sleep until the politeness delay since the previous request has
    /// elapsed, then mark this request as started.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.request_delay {
                let wait = self.request_delay - elapsed;
                debug!("Rate limiting: waiting {wait:?}");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        self.acquire().await;

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => return FetchResult::failed(0, err.to_string()),
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return FetchResult::failed(status, format!("HTTP {status}"));
        }

        match response.text().await {
            Ok(body) => FetchResult::ok(status, body),
            Err(err) => FetchResult::failed(status, err.to_string()),
        }
    }
}
