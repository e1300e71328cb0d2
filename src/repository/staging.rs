//! Staging repository: raw glamour records, the item catalog, and the crawl
//! checkpoint, all in one SQLite database.
//!
//! This is the write side of the crawl and the read side of the aggregator.
//! Everything here is staging data, deleted by `cleanup` once a publish has
//! fully succeeded.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::crawler::{ProgressStore, SubjectIndex};
use crate::models::{
    CrawlProgress, ExtractedItem, GlamourRecord, PairAggregate, UsageAggregate,
};

use super::{connect, RepositoryError, Result};

/// SQLite-backed staging repository.
pub struct StagingRepository {
    db_path: PathBuf,
}

impl StagingRepository {
    /// Open (and initialize) the staging database.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            -- Raw per-character glamour rows
            CREATE TABLE IF NOT EXISTS glamour_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                character_id TEXT NOT NULL,
                slot_id INTEGER NOT NULL CHECK (slot_id BETWEEN 1 AND 5),
                item_id TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            );

            -- Item catalog, keyed by Lodestone item id
            CREATE TABLE IF NOT EXISTS items_cache (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slot_id INTEGER NOT NULL
            );

            -- Crawl checkpoint, one row per job name
            CREATE TABLE IF NOT EXISTS crawl_progress (
                job_name TEXT PRIMARY KEY,
                last_completed_index INTEGER NOT NULL DEFAULT -1,
                total_keys INTEGER NOT NULL,
                processed_characters INTEGER NOT NULL DEFAULT 0,
                seed INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_glamour_character
                ON glamour_records(character_id);
            CREATE INDEX IF NOT EXISTS idx_glamour_slot
                ON glamour_records(slot_id);
            CREATE INDEX IF NOT EXISTS idx_items_slot
                ON items_cache(slot_id);
        "#,
        )?;
        Ok(())
    }

    /// Insert one character's glamour rows in a single transaction.
    pub fn insert_glamour_records(&self, records: &[GlamourRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO glamour_records (character_id, slot_id, item_id, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let now = Utc::now().to_rfc3339();
            for record in records {
                if !(1..=5).contains(&record.slot_id) {
                    return Err(RepositoryError::InvalidRecord(format!(
                        "slot_id {} out of range",
                        record.slot_id
                    )));
                }
                stmt.execute(params![
                    record.character_id,
                    record.slot_id,
                    record.item_id,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Upsert one item into the catalog. Names refresh on conflict.
    pub fn cache_item(&self, item: &ExtractedItem) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO items_cache (id, name, slot_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, slot_id = excluded.slot_id",
            params![item.id, item.name, item.slot_id],
        )?;
        Ok(())
    }

    /// Whether the catalog already knows this item (so the item page fetch
    /// can be skipped).
    pub fn item_cached(&self, item_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items_cache WHERE id = ?1",
            params![item_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn character_exists(&self, character_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM glamour_records WHERE character_id = ?1",
            params![character_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All distinct items from the catalog. The table is keyed by id, so no
    /// deduplication is needed here.
    pub fn all_items(&self) -> Result<Vec<ExtractedItem>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT id, name, slot_id FROM items_cache ORDER BY id")?;
        let items = stmt
            .query_map([], |row| {
                Ok(ExtractedItem {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slot_id: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Usage counts grouped by slot and item.
    pub fn usage_counts(&self) -> Result<Vec<UsageAggregate>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT slot_id, item_id, COUNT(*) FROM glamour_records
             GROUP BY slot_id, item_id
             ORDER BY slot_id, item_id",
        )?;
        let usage = stmt
            .query_map([], |row| {
                Ok(UsageAggregate {
                    slot_id: row.get(0)?,
                    item_id: row.get(1)?,
                    usage_count: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(usage)
    }

    /// Co-occurrence counts for one slot pair, ranked count-descending per
    /// item A and cut off at rank 10. Tie order within a count is the
    /// database's stable ordering.
    pub fn pair_counts(
        &self,
        slot_pair: &str,
        slot_id_a: i64,
        slot_id_b: i64,
    ) -> Result<Vec<PairAggregate>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            WITH pairs AS (
                SELECT
                    a.item_id AS item_id_a,
                    b.item_id AS item_id_b,
                    COUNT(*) AS pair_count
                FROM glamour_records a
                INNER JOIN glamour_records b ON a.character_id = b.character_id
                WHERE a.slot_id = ?1
                  AND b.slot_id = ?2
                GROUP BY a.item_id, b.item_id
            ),
            ranked AS (
                SELECT
                    item_id_a,
                    item_id_b,
                    pair_count,
                    ROW_NUMBER() OVER (
                        PARTITION BY item_id_a ORDER BY pair_count DESC
                    ) AS rank
                FROM pairs
            )
            SELECT item_id_a, item_id_b, pair_count, rank
            FROM ranked
            WHERE rank <= 10
            ORDER BY item_id_a, rank
        "#,
        )?;
        let pairs = stmt
            .query_map(params![slot_id_a, slot_id_b], |row| {
                Ok(PairAggregate {
                    slot_pair: slot_pair.to_string(),
                    item_id_a: row.get(0)?,
                    item_id_b: row.get(1)?,
                    pair_count: row.get(2)?,
                    rank: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    /// The checkpoint row regardless of job name, for completeness checks
    /// and the status command.
    pub fn any_progress(&self) -> Result<Option<CrawlProgress>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT job_name, last_completed_index, total_keys, processed_characters, seed,
                    updated_at
             FROM crawl_progress LIMIT 1",
            [],
            row_to_progress,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Delete all staging data. Run only after a confirmed successful
    /// publish.
    pub fn cleanup(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            "DELETE FROM glamour_records;
             DELETE FROM items_cache;
             DELETE FROM crawl_progress;",
        )?;
        Ok(())
    }
}

fn row_to_progress(row: &rusqlite::Row<'_>) -> rusqlite::Result<CrawlProgress> {
    let updated_at: String = row.get(5)?;
    Ok(CrawlProgress {
        job_name: row.get(0)?,
        last_completed_index: row.get(1)?,
        total_keys: row.get(2)?,
        processed_characters: row.get(3)?,
        seed: row.get(4)?,
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(chrono::DateTime::UNIX_EPOCH),
    })
}

impl ProgressStore for StagingRepository {
    fn load(&self, job_name: &str) -> Result<Option<CrawlProgress>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT job_name, last_completed_index, total_keys, processed_characters, seed,
                    updated_at
             FROM crawl_progress WHERE job_name = ?1",
            params![job_name],
            row_to_progress,
        )
        .optional()
        .map_err(Into::into)
    }

    fn save(&self, progress: &CrawlProgress) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO crawl_progress
                 (job_name, last_completed_index, total_keys, processed_characters, seed,
                  updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(job_name) DO UPDATE SET
                 last_completed_index = excluded.last_completed_index,
                 total_keys = excluded.total_keys,
                 processed_characters = excluded.processed_characters,
                 seed = excluded.seed,
                 updated_at = excluded.updated_at",
            params![
                progress.job_name,
                progress.last_completed_index,
                progress.total_keys,
                progress.processed_characters,
                progress.seed,
                progress.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl SubjectIndex for StagingRepository {
    fn exists(&self, character_id: &str) -> Result<bool> {
        self.character_exists(character_id)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn repo() -> (TempDir, StagingRepository) {
        let dir = TempDir::new().unwrap();
        let repo = StagingRepository::new(&dir.path().join("staging.sqlite")).unwrap();
        (dir, repo)
    }

    fn record(character: &str, slot: i64, item: &str) -> GlamourRecord {
        GlamourRecord {
            character_id: character.to_string(),
            slot_id: slot,
            item_id: item.to_string(),
        }
    }

    #[test]
    fn glamour_roundtrip_and_existence() {
        let (_dir, repo) = repo();
        assert!(!repo.character_exists("c1").unwrap());

        let saved = repo
            .insert_glamour_records(&[record("c1", 1, "i1"), record("c1", 2, "i2")])
            .unwrap();
        assert_eq!(saved, 2);
        assert!(repo.character_exists("c1").unwrap());
        assert!(!repo.character_exists("c2").unwrap());
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let (_dir, repo) = repo();
        let err = repo.insert_glamour_records(&[record("c1", 9, "i1")]);
        assert!(matches!(err, Err(RepositoryError::InvalidRecord(_))));
        // The transaction rolled back; nothing was persisted.
        assert!(!repo.character_exists("c1").unwrap());
    }

    #[test]
    fn item_cache_upserts() {
        let (_dir, repo) = repo();
        let mut item = ExtractedItem {
            id: "i1".to_string(),
            name: "Old Name".to_string(),
            slot_id: 1,
        };
        repo.cache_item(&item).unwrap();
        assert!(repo.item_cached("i1").unwrap());

        item.name = "New Name".to_string();
        repo.cache_item(&item).unwrap();

        let items = repo.all_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "New Name");
    }

    #[test]
    fn usage_counts_group_by_slot_and_item() {
        let (_dir, repo) = repo();
        repo.insert_glamour_records(&[
            record("c1", 1, "hat"),
            record("c2", 1, "hat"),
            record("c3", 1, "cap"),
            record("c1", 2, "coat"),
        ])
        .unwrap();

        let usage = repo.usage_counts().unwrap();
        assert_eq!(
            usage,
            vec![
                UsageAggregate {
                    slot_id: 1,
                    item_id: "cap".to_string(),
                    usage_count: 1
                },
                UsageAggregate {
                    slot_id: 1,
                    item_id: "hat".to_string(),
                    usage_count: 2
                },
                UsageAggregate {
                    slot_id: 2,
                    item_id: "coat".to_string(),
                    usage_count: 1
                },
            ]
        );
    }

    #[test]
    fn pair_counts_rank_top_10_per_item_a() {
        let (_dir, repo) = repo();
        // One head item paired with 11 distinct body items, descending
        // counts 12, 11, ..., 2.
        let mut records = Vec::new();
        for (n, count) in (2..=12).rev().enumerate() {
            for c in 0..count {
                let character = format!("c-{n}-{c}");
                records.push(record(&character, 1, "hat"));
                records.push(record(&character, 2, &format!("coat{n}")));
            }
        }
        repo.insert_glamour_records(&records).unwrap();

        let pairs = repo.pair_counts("head-body", 1, 2).unwrap();
        assert_eq!(pairs.len(), 10);
        assert_eq!(
            pairs.iter().map(|p| p.rank).collect::<Vec<_>>(),
            (1..=10).collect::<Vec<_>>()
        );
        assert_eq!(pairs[0].item_id_b, "coat0");
        assert_eq!(pairs[0].pair_count, 12);
        // Rank 11 (coat10, count 2) is cut off.
        assert!(pairs.iter().all(|p| p.item_id_b != "coat10"));
    }

    #[test]
    fn progress_upsert_is_singleton_per_job() {
        let (_dir, repo) = repo();
        let mut progress = CrawlProgress {
            job_name: "job".to_string(),
            last_completed_index: 3,
            total_keys: 1536,
            processed_characters: 12,
            seed: 42,
            updated_at: Utc::now(),
        };
        repo.save(&progress).unwrap();
        progress.last_completed_index = 9;
        repo.save(&progress).unwrap();

        let loaded = ProgressStore::load(&repo, "job").unwrap().unwrap();
        assert_eq!(loaded.last_completed_index, 9);
        assert_eq!(loaded.seed, 42);

        let conn = repo.connect().unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM crawl_progress", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn cleanup_deletes_all_staging_data() {
        let (_dir, repo) = repo();
        repo.insert_glamour_records(&[record("c1", 1, "i1")]).unwrap();
        repo.cache_item(&ExtractedItem {
            id: "i1".to_string(),
            name: "Item".to_string(),
            slot_id: 1,
        })
        .unwrap();
        repo.save(&CrawlProgress {
            job_name: "job".to_string(),
            last_completed_index: 0,
            total_keys: 1,
            processed_characters: 1,
            seed: 42,
            updated_at: Utc::now(),
        })
        .unwrap();

        repo.cleanup().unwrap();

        assert!(!repo.character_exists("c1").unwrap());
        assert!(repo.all_items().unwrap().is_empty());
        assert!(repo.any_progress().unwrap().is_none());
    }
}
