//! Durable crawl checkpoint store.
//!
//! One row per job name, upserted after every fully processed key. The
//! production store is the staging database (`repository::staging`); the
//! in-memory store backs orchestrator tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::CrawlProgress;
use crate::repository::RepositoryError;

/// Checkpoint persistence seam. Load once at start-of-run, save per key.
pub trait ProgressStore: Send + Sync {
    fn load(&self, job_name: &str) -> Result<Option<CrawlProgress>, RepositoryError>;
    /// Upsert keyed by job name; last writer wins.
    fn save(&self, progress: &CrawlProgress) -> Result<(), RepositoryError>;
}

/// In-memory progress store.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    rows: Mutex<HashMap<String, CrawlProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self, job_name: &str) -> Result<Option<CrawlProgress>, RepositoryError> {
        Ok(self.rows.lock().unwrap().get(job_name).cloned())
    }

    fn save(&self, progress: &CrawlProgress) -> Result<(), RepositoryError> {
        self.rows
            .lock()
            .unwrap()
            .insert(progress.job_name.clone(), progress.clone());
        Ok(())
    }
}
