//! Aggregation over the staging database: item extraction, usage counts,
//! pair rankings, and the crawl-completeness gate for publishing.

use std::sync::Arc;

use crate::models::{ExtractedItem, PairAggregate, UsageAggregate, SLOT_PAIRS};
use crate::repository::{RepositoryError, StagingRepository};

/// Read side of the sync runner. The production implementation queries the
/// staging database; tests feed the runner canned aggregates.
pub trait StatsSource: Send + Sync {
    fn extract_unique_items(&self) -> Result<Vec<ExtractedItem>, RepositoryError>;
    fn aggregate_usage(&self) -> Result<Vec<UsageAggregate>, RepositoryError>;
    fn aggregate_pairs(&self) -> Result<Vec<PairAggregate>, RepositoryError>;
    /// True iff a progress record exists and its checkpoint has reached the
    /// final key.
    fn is_crawl_complete(&self) -> Result<bool, RepositoryError>;
    /// Delete all staging data. Only called after a fully successful
    /// publish.
    fn cleanup(&self) -> Result<(), RepositoryError>;
}

/// Staging-database aggregator.
pub struct Aggregator {
    repository: Arc<StagingRepository>,
}

impl Aggregator {
    pub fn new(repository: Arc<StagingRepository>) -> Self {
        Self { repository }
    }
}

impl StatsSource for Aggregator {
    fn extract_unique_items(&self) -> Result<Vec<ExtractedItem>, RepositoryError> {
        self.repository.all_items()
    }

    fn aggregate_usage(&self) -> Result<Vec<UsageAggregate>, RepositoryError> {
        self.repository.usage_counts()
    }

    /// One ranked query per configured slot pair, concatenated.
    fn aggregate_pairs(&self) -> Result<Vec<PairAggregate>, RepositoryError> {
        let mut all_pairs = Vec::new();
        for (slot_pair, slot_a, slot_b) in SLOT_PAIRS {
            all_pairs.extend(self.repository.pair_counts(slot_pair, slot_a, slot_b)?);
        }
        Ok(all_pairs)
    }

    fn is_crawl_complete(&self) -> Result<bool, RepositoryError> {
        Ok(self
            .repository
            .any_progress()?
            .is_some_and(|p| p.last_completed_index >= p.total_keys - 1))
    }

    fn cleanup(&self) -> Result<(), RepositoryError> {
        self.repository.cleanup()
    }
}
