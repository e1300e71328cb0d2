//! Per-character glamour scraper: fetch the character page, extract mirage
//! rows, fill the item catalog, persist staging records.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::crawler::{PageFetcher, SubjectProcessor};
use crate::models::{ExtractedItem, GlamourRecord, ProcessOutcome};
use crate::parsers::{parse_glamour_rows, parse_item_name};
use crate::repository::StagingRepository;

const CHARACTER_BASE_URL: &str = "https://jp.finalfantasyxiv.com/lodestone/character/";
const ITEM_BASE_URL: &str = "https://jp.finalfantasyxiv.com/lodestone/playguide/db/item/";

pub struct CharacterScraper {
    fetcher: Arc<dyn PageFetcher>,
    repository: Arc<StagingRepository>,
}

impl CharacterScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>, repository: Arc<StagingRepository>) -> Self {
        Self {
            fetcher,
            repository,
        }
    }

    /// Make sure the catalog knows this item, fetching its detail page for
    /// the name when it is new. A failed name lookup falls back to the item
    /// id so the catalog row still exists.
    async fn ensure_item_cached(&self, item_id: &str, slot_id: i64) -> Result<(), String> {
        if self
            .repository
            .item_cached(item_id)
            .map_err(|e| e.to_string())?
        {
            return Ok(());
        }

        let result = self.fetcher.fetch(&format!("{ITEM_BASE_URL}{item_id}/")).await;
        let name = result
            .body
            .filter(|_| result.success)
            .as_deref()
            .and_then(parse_item_name)
            .unwrap_or_else(|| {
                warn!("No item name for {item_id}, falling back to id");
                item_id.to_string()
            });

        self.repository
            .cache_item(&ExtractedItem {
                id: item_id.to_string(),
                name,
                slot_id,
            })
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl SubjectProcessor for CharacterScraper {
    async fn process(&self, character_id: &str) -> ProcessOutcome {
        let url = format!("{CHARACTER_BASE_URL}{character_id}/");
        let result = self.fetcher.fetch(&url).await;
        let Some(body) = result.body.filter(|_| result.success) else {
            return ProcessOutcome {
                success: false,
                saved_count: 0,
                errors: vec![format!(
                    "Character page fetch failed (status {}): {}",
                    result.status,
                    result.error.unwrap_or_default()
                )],
            };
        };

        let rows = parse_glamour_rows(&body);
        if rows.is_empty() {
            // Success with nothing saved; the orchestrator counts this as
            // skipped.
            return ProcessOutcome {
                success: true,
                saved_count: 0,
                errors: vec![],
            };
        }

        let mut errors = Vec::new();
        for row in &rows {
            if let Err(err) = self.ensure_item_cached(&row.item_id, row.slot_id).await {
                errors.push(format!("Item cache failed for {}: {err}", row.item_id));
            }
        }

        let records: Vec<GlamourRecord> = rows
            .iter()
            .map(|row| GlamourRecord {
                character_id: character_id.to_string(),
                slot_id: row.slot_id,
                item_id: row.item_id.clone(),
            })
            .collect();

        match self.repository.insert_glamour_records(&records) {
            Ok(saved_count) => {
                info!("Saved {saved_count} glamour rows for {character_id}");
                ProcessOutcome {
                    success: true,
                    saved_count,
                    errors,
                }
            }
            Err(err) => {
                errors.push(format!("Persist failed: {err}"));
                ProcessOutcome {
                    success: false,
                    saved_count: 0,
                    errors,
                }
            }
        }
    }
}
