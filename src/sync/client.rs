//! HTTP client for the remote write API.
//!
//! Payloads are sent in size-bounded chunks. Transport retries 5xx and
//! network errors with exponential backoff (base delay doubling per
//! attempt); authentication failures fail fast with no retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::SyncSettings;
use crate::models::{ExtractedItem, PairAggregate, UsageAggregate};

use super::SyncError;

/// Items phase outcome, summed over chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemsOutcome {
    pub inserted: u64,
    pub skipped: u64,
}

/// Remote sync endpoints. Each call is idempotent per chunk.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Open a staged publish; returns the opaque version token.
    async fn start_sync(&self) -> Result<String, SyncError>;
    /// Atomically swap the active version pointer to `version`.
    async fn commit_sync(&self, version: &str) -> Result<(), SyncError>;
    /// Delete the staged version's data, leaving the active version intact.
    async fn abort_sync(&self, version: &str) -> Result<(), SyncError>;
    /// Version-free item upserts.
    async fn post_items(&self, items: &[ExtractedItem]) -> Result<ItemsOutcome, SyncError>;
    /// Version-scoped usage inserts; returns rows inserted.
    async fn post_usage(&self, version: &str, usage: &[UsageAggregate]) -> Result<u64, SyncError>;
    /// Version-scoped pair inserts; returns rows inserted.
    async fn post_pairs(&self, version: &str, pairs: &[PairAggregate]) -> Result<u64, SyncError>;
}

/// Chunk sizes per payload kind.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSizes {
    pub items: usize,
    pub usage: usize,
    pub pairs: usize,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    version: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkResponse {
    #[serde(default)]
    inserted: u64,
    #[serde(default)]
    skipped: u64,
}

/// Production [`RemoteClient`] over reqwest.
pub struct HttpRemoteClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
    chunk_sizes: ChunkSizes,
    retry_count: u32,
    retry_base_delay: Duration,
}

impl HttpRemoteClient {
    pub fn new(settings: &SyncSettings, auth_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            auth_token,
            chunk_sizes: ChunkSizes {
                items: settings.items_chunk_size,
                usage: settings.usage_chunk_size,
                pairs: settings.pairs_chunk_size,
            },
            retry_count: settings.retry_count,
            retry_base_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }

    /// POST a JSON body, retrying 5xx and network errors with exponential
    /// backoff. 401 fails fast. Any other response is returned to the
    /// caller for interpretation.
    async fn post_with_retry(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, SyncError> {
        let mut last_error = SyncError::Network("request failed".to_string());

        for attempt in 0..self.retry_count {
            let result = self
                .client
                .post(url)
                .bearer_auth(&self.auth_token)
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                    return Err(SyncError::Unauthorized);
                }
                Ok(response) if response.status().is_server_error() => {
                    last_error = SyncError::Server {
                        status: response.status().as_u16(),
                    };
                }
                Ok(response) => return Ok(response),
                Err(err) => {
                    last_error = SyncError::Network(err.to_string());
                }
            }

            if attempt + 1 < self.retry_count {
                let delay = self.retry_base_delay * 2u32.pow(attempt);
                warn!("Sync request to {url} failed ({last_error}), retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error)
    }

    /// POST and decode, converting non-success responses to errors.
    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, SyncError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.post_with_retry(&url, &body).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| SyncError::MalformedResponse(err.to_string()))
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn start_sync(&self) -> Result<String, SyncError> {
        let response: StartResponse = self.post_json("/api/sync/start", json!({})).await?;
        debug!("Started sync version {}", response.version);
        Ok(response.version)
    }

    async fn commit_sync(&self, version: &str) -> Result<(), SyncError> {
        self.post_json::<serde_json::Value>("/api/sync/commit", json!({ "version": version }))
            .await?;
        Ok(())
    }

    async fn abort_sync(&self, version: &str) -> Result<(), SyncError> {
        self.post_json::<serde_json::Value>("/api/sync/abort", json!({ "version": version }))
            .await?;
        Ok(())
    }

    async fn post_items(&self, items: &[ExtractedItem]) -> Result<ItemsOutcome, SyncError> {
        let mut outcome = ItemsOutcome::default();
        for chunk in items.chunks(self.chunk_sizes.items.max(1)) {
            let response: ChunkResponse = self
                .post_json("/api/items", json!({ "items": chunk }))
                .await?;
            outcome.inserted += response.inserted;
            outcome.skipped += response.skipped;
        }
        Ok(outcome)
    }

    async fn post_usage(&self, version: &str, usage: &[UsageAggregate]) -> Result<u64, SyncError> {
        let mut inserted = 0;
        for chunk in usage.chunks(self.chunk_sizes.usage.max(1)) {
            let response: ChunkResponse = self
                .post_json(
                    &format!("/api/usage?version={version}"),
                    json!({ "usage": chunk }),
                )
                .await?;
            inserted += response.inserted;
        }
        Ok(inserted)
    }

    async fn post_pairs(&self, version: &str, pairs: &[PairAggregate]) -> Result<u64, SyncError> {
        let mut inserted = 0;
        for chunk in pairs.chunks(self.chunk_sizes.pairs.max(1)) {
            let response: ChunkResponse = self
                .post_json(
                    &format!("/api/pairs?version={version}"),
                    json!({ "pairs": chunk }),
                )
                .await?;
            inserted += response.inserted;
        }
        Ok(inserted)
    }
}
