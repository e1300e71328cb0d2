//! Configuration management for glamscrape.
//!
//! Settings load from an optional TOML file with environment overrides for
//! secrets. Every tunable has a documented default; nothing is module-level
//! mutable state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default shuffle seed. Keys are crawled in a seed-reproduced shuffled
/// order so resume works across runs with the same seed.
pub const DEFAULT_SEED: u32 = 42;

/// Default minimum character level for listing rows. Listings are sorted by
/// level descending, so the first row below this ends the key's walk.
pub const DEFAULT_MIN_LEVEL: u32 = 100;

/// Safety cap on pages fetched per search key, against malformed pagination.
pub const DEFAULT_MAX_PAGES: u32 = 100;

/// Crawl fetch attempts (1 initial + retries) on 429/503/network errors.
pub const DEFAULT_FETCH_MAX_RETRIES: u32 = 3;

/// Fixed delay between crawl fetch retries. The upstream throttle specifies
/// an approximate fixed cooldown, so there is no backoff growth here.
pub const DEFAULT_FETCH_RETRY_DELAY_MS: u64 = 60_000;

/// Politeness delay between successive page fetches.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 2_000;

/// Sync chunk retry attempts and exponential backoff base delay.
pub const DEFAULT_SYNC_RETRY_COUNT: u32 = 3;
pub const DEFAULT_SYNC_RETRY_DELAY_MS: u64 = 1_000;

/// Sync chunk sizes per payload kind.
pub const DEFAULT_ITEMS_CHUNK_SIZE: usize = 500;
pub const DEFAULT_USAGE_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_PAIRS_CHUNK_SIZE: usize = 1_000;

/// Top-level settings, one section per layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the staging database. Defaults to the current dir.
    pub data_dir: Option<PathBuf>,
    pub crawler: CrawlerSettings,
    pub fetch: FetchSettings,
    pub sync: SyncSettings,
}

/// Crawl orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSettings {
    /// Job name keying the progress checkpoint row.
    pub job_name: String,
    /// Shuffle seed for the key sequence.
    pub seed: u32,
    /// Worlds to crawl. Empty means the default scope (Tiamat only).
    pub worlds: Vec<String>,
    /// Data center name expanding to its eight worlds. Ignored when `worlds`
    /// is non-empty.
    pub data_center: Option<String>,
    pub min_level: u32,
    pub max_pages: u32,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            job_name: "lodestone-glamour".to_string(),
            seed: DEFAULT_SEED,
            worlds: Vec::new(),
            data_center: None,
            min_level: DEFAULT_MIN_LEVEL,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// HTTP fetch and retry settings for the crawl side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_delay_ms: u64,
    /// Status codes retried as transient. 0 is the network-failure sentinel.
    pub retryable_status_codes: Vec<u16>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_FETCH_MAX_RETRIES,
            retry_delay_ms: DEFAULT_FETCH_RETRY_DELAY_MS,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            retryable_status_codes: vec![429, 503, 0],
        }
    }
}

/// Remote publish settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Base URL of the remote write API.
    pub base_url: String,
    /// Bearer token. Usually supplied via GLAMSCRAPE_AUTH_TOKEN instead.
    pub auth_token: Option<String>,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub items_chunk_size: usize,
    pub usage_chunk_size: usize,
    pub pairs_chunk_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: None,
            retry_count: DEFAULT_SYNC_RETRY_COUNT,
            retry_delay_ms: DEFAULT_SYNC_RETRY_DELAY_MS,
            items_chunk_size: DEFAULT_ITEMS_CHUNK_SIZE,
            usage_chunk_size: DEFAULT_USAGE_CHUNK_SIZE,
            pairs_chunk_size: DEFAULT_PAIRS_CHUNK_SIZE,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut settings = if path.exists() {
            let raw = fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            Self::default()
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Environment overrides for values that should not live in the file.
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("GLAMSCRAPE_AUTH_TOKEN") {
            self.sync.auth_token = Some(token);
        }
        if let Ok(url) = std::env::var("GLAMSCRAPE_SYNC_URL") {
            self.sync.base_url = url;
        }
    }

    /// Path of the staging database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glamscrape.sqlite")
    }
}
