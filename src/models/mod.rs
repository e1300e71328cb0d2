//! Core domain types shared across the crawl, aggregation and sync layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Equipment slot ids tracked by the system.
///
/// 1: head, 2: body, 3: hands, 4: legs, 5: feet.
pub const SLOT_HEAD: i64 = 1;
pub const SLOT_BODY: i64 = 2;
pub const SLOT_HANDS: i64 = 3;
pub const SLOT_LEGS: i64 = 4;
pub const SLOT_FEET: i64 = 5;

/// Adjacent slot pairs for which co-occurrence statistics are computed.
///
/// The pair label is what readers query by; the slot ids drive the self-join
/// over the staging table. Item A is always the smaller slot id side.
pub const SLOT_PAIRS: [(&str, i64, i64); 4] = [
    ("head-body", SLOT_HEAD, SLOT_BODY),
    ("body-hands", SLOT_BODY, SLOT_HANDS),
    ("body-legs", SLOT_BODY, SLOT_LEGS),
    ("legs-feet", SLOT_LEGS, SLOT_FEET),
];

/// One glamour row scraped from a character page: the item worn (as mirage)
/// in one equipment slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlamourRecord {
    pub character_id: String,
    pub slot_id: i64,
    pub item_id: String,
}

/// A distinct item seen across all glamour records, from the local catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "slotId")]
    pub slot_id: i64,
}

/// Usage count for one item across all scraped characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageAggregate {
    #[serde(rename = "slotId")]
    pub slot_id: i64,
    #[serde(rename = "itemId")]
    pub item_id: String,
    #[serde(rename = "usageCount")]
    pub usage_count: i64,
}

/// One ranked co-occurrence entry: how often `item_id_b` appears together
/// with `item_id_a` on the same character, for one slot pair.
///
/// Rank is 1-10 within each `(slot_pair, item_id_a)` group, count-descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairAggregate {
    #[serde(rename = "slotPair")]
    pub slot_pair: String,
    #[serde(rename = "itemIdA")]
    pub item_id_a: String,
    #[serde(rename = "itemIdB")]
    pub item_id_b: String,
    #[serde(rename = "pairCount")]
    pub pair_count: i64,
    pub rank: i64,
}

/// Durable per-job crawl checkpoint. Upserted after every fully processed
/// search key; a singleton row per job name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlProgress {
    pub job_name: String,
    /// Origin index of the last fully processed key, -1 when not started.
    pub last_completed_index: i64,
    pub total_keys: i64,
    pub processed_characters: i64,
    /// Shuffle seed the checkpointed run was generated with. Resume only
    /// makes sense against the identical shuffled order.
    pub seed: u32,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of processing one character: scrape, parse, persist.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    pub success: bool,
    /// Number of glamour rows persisted. Zero with success means the
    /// character had no glamour data (counted as skipped, not processed).
    pub saved_count: usize,
    pub errors: Vec<String>,
}
