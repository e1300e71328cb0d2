//! Crawl orchestrator: drives the key space through the listing walker and
//! the per-character processor, checkpointing progress at key granularity.
//!
//! Resume semantics: a run loads its checkpoint once, computes
//! `resume_threshold = last_completed_index + 1`, and skips any key whose
//! origin index is below that threshold while iterating the seed-reproduced
//! shuffled order. Origin index does not track shuffled position; this skip
//! is only meaningful because the same seed regenerates the identical
//! sequence. Do not change this comparison.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::models::{CrawlProgress, ProcessOutcome};
use crate::repository::RepositoryError;

use super::listing::CandidateSource;
use super::progress::ProgressStore;
use super::search_key::SearchKeySpace;

/// Per-character processing seam: scrape, parse, persist one character.
#[async_trait::async_trait]
pub trait SubjectProcessor: Send + Sync {
    async fn process(&self, character_id: &str) -> ProcessOutcome;
}

/// Existence check against the staging store, so already-scraped characters
/// are skipped without a fetch.
pub trait SubjectIndex: Send + Sync {
    fn exists(&self, character_id: &str) -> Result<bool, RepositoryError>;
}

/// Lifecycle of one crawl run. A dry run jumps straight to `Completed`
/// after printing the key sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    NotStarted,
    Running,
    Completed,
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Job name keying the checkpoint row.
    pub job_name: String,
    /// Print the generated key sequence and exit without fetching.
    pub dry_run: bool,
}

/// Running totals, returned as the final run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub total_keys: u64,
    pub processed_keys: u64,
    pub processed_characters: u64,
    pub skipped_characters: u64,
    pub errors: u64,
}

/// Called synchronously after each fully processed key.
pub type KeyObserver = Box<dyn Fn(&CrawlStats) + Send + Sync>;

pub struct Crawler {
    config: CrawlerConfig,
    key_space: SearchKeySpace,
    source: Arc<dyn CandidateSource>,
    progress: Arc<dyn ProgressStore>,
    index: Arc<dyn SubjectIndex>,
    processor: Arc<dyn SubjectProcessor>,
    on_key_completed: Option<KeyObserver>,
    state: CrawlState,
    stats: CrawlStats,
}

impl Crawler {
    pub fn new(
        config: CrawlerConfig,
        key_space: SearchKeySpace,
        source: Arc<dyn CandidateSource>,
        progress: Arc<dyn ProgressStore>,
        index: Arc<dyn SubjectIndex>,
        processor: Arc<dyn SubjectProcessor>,
    ) -> Self {
        Self {
            config,
            key_space,
            source,
            progress,
            index,
            processor,
            on_key_completed: None,
            state: CrawlState::NotStarted,
            stats: CrawlStats::default(),
        }
    }

    /// Attach an observer invoked once per completed key.
    pub fn with_key_observer(mut self, observer: KeyObserver) -> Self {
        self.on_key_completed = Some(observer);
        self
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Run the crawl to completion. Per-character errors are counted, never
    /// fatal; only checkpoint persistence failures abort the run.
    pub async fn run(&mut self) -> Result<CrawlStats, RepositoryError> {
        self.state = CrawlState::Running;
        let keys = self.key_space.generate_all();
        self.stats.total_keys = keys.len() as u64;

        info!("Starting crawler: {}", self.config.job_name);
        info!("Total keys: {}", self.stats.total_keys);

        if self.config.dry_run {
            info!("Dry run mode - printing keys and exiting");
            for key in &keys {
                println!("  [{}] {}", key.origin_index, key);
            }
            self.state = CrawlState::Completed;
            return Ok(self.stats.clone());
        }

        let resume_threshold = match self.progress.load(&self.config.job_name)? {
            Some(existing) => {
                info!("Resuming from index {}", existing.last_completed_index + 1);
                self.stats.processed_characters = existing.processed_characters.max(0) as u64;
                existing.last_completed_index + 1
            }
            None => 0,
        };

        for key in &keys {
            if (key.origin_index as i64) < resume_threshold {
                continue;
            }

            info!(
                "Processing key {}/{}: {key}",
                key.origin_index + 1,
                self.stats.total_keys
            );

            let character_ids = self.source.candidate_ids(key).await;
            info!("Found {} characters", character_ids.len());

            for character_id in &character_ids {
                self.process_character(character_id).await?;
            }

            self.stats.processed_keys += 1;
            self.progress.save(&CrawlProgress {
                job_name: self.config.job_name.clone(),
                last_completed_index: key.origin_index as i64,
                total_keys: self.stats.total_keys as i64,
                processed_characters: self.stats.processed_characters as i64,
                seed: self.key_space.seed(),
                updated_at: Utc::now(),
            })?;

            info!(
                "Key {}/{} completed. Processed: {}, Skipped: {}, Errors: {}",
                key.origin_index + 1,
                self.stats.total_keys,
                self.stats.processed_characters,
                self.stats.skipped_characters,
                self.stats.errors
            );
            if let Some(observer) = &self.on_key_completed {
                observer(&self.stats);
            }
        }

        info!(
            "Crawl completed. Keys={}/{}, Characters={}, Skipped={}, Errors={}",
            self.stats.processed_keys,
            self.stats.total_keys,
            self.stats.processed_characters,
            self.stats.skipped_characters,
            self.stats.errors
        );

        self.state = CrawlState::Completed;
        Ok(self.stats.clone())
    }

    async fn process_character(&mut self, character_id: &str) -> Result<(), RepositoryError> {
        if self.index.exists(character_id)? {
            info!("Skipping existing character: {character_id}");
            self.stats.skipped_characters += 1;
            return Ok(());
        }

        let outcome = self.processor.process(character_id).await;
        if outcome.success {
            if outcome.saved_count > 0 {
                self.stats.processed_characters += 1;
                info!(
                    "Scraped character {character_id}: {} items saved",
                    outcome.saved_count
                );
            } else {
                // No glamour data counts as skipped, not processed.
                self.stats.skipped_characters += 1;
                info!("Skipping character {character_id}: no glamour data");
            }
        } else {
            self.stats.errors += 1;
            error!(
                "Error scraping character {character_id}: {}",
                outcome.errors.join(", ")
            );
        }
        Ok(())
    }
}
