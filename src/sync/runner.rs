//! Core sync flow: items upsert, then the version-scoped stats publish
//! (start -> usage -> pairs -> commit, abort on any failure), then staging
//! cleanup when everything succeeded.

use tracing::{info, warn};

use crate::aggregate::StatsSource;

use super::client::RemoteClient;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Compute aggregates but perform no remote call and no cleanup.
    pub dry_run: bool,
    /// Publish only the item catalog.
    pub items_only: bool,
    /// Publish only the versioned statistics.
    pub stats_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Items,
    Usage,
    Pairs,
    Cleanup,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncPhase::Items => "items",
            SyncPhase::Usage => "usage",
            SyncPhase::Pairs => "pairs",
            SyncPhase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Snapshot passed to the progress observer, once per completed phase.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub processed: usize,
    pub total: usize,
    pub errors: usize,
}

/// Observer invoked synchronously on phase completion. No buffering; the
/// callback sees each event exactly once, in order.
pub type ProgressObserver<'a> = &'a (dyn Fn(&SyncProgress) + Send + Sync);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub items_inserted: u64,
    pub items_skipped: u64,
    pub usage_inserted: u64,
    pub pairs_inserted: u64,
    pub errors: Vec<String>,
}

/// Human-readable phase summary for CLI output.
pub fn format_progress(progress: &SyncProgress) -> String {
    let percent = if progress.total > 0 {
        progress.processed * 100 / progress.total
    } else {
        0
    };
    let errors = if progress.errors > 0 {
        format!(", errors: {}", progress.errors)
    } else {
        String::new()
    };
    format!(
        "[{}] {}/{} ({percent}%){errors}",
        progress.phase, progress.processed, progress.total
    )
}

/// Execute one publish attempt.
///
/// Unless dry-running, an incomplete crawl skips the whole sync: partial
/// crawls must never publish partial statistics as final.
pub async fn run_sync(
    stats: &dyn StatsSource,
    client: &dyn RemoteClient,
    options: SyncOptions,
    on_progress: Option<ProgressObserver<'_>>,
) -> SyncResult {
    let mut result = SyncResult::default();
    let notify = |progress: &SyncProgress| {
        if let Some(observer) = on_progress {
            observer(progress);
        }
    };

    if !options.dry_run {
        match stats.is_crawl_complete() {
            Ok(true) => {}
            Ok(false) => {
                result
                    .errors
                    .push("Crawler not finished yet, skipping sync".to_string());
                return result;
            }
            Err(err) => {
                result.errors.push(format!("Completeness check failed: {err}"));
                return result;
            }
        }
    }

    // Items phase: version-free upserts.
    if !options.stats_only {
        match stats.extract_unique_items() {
            Ok(items) => {
                if options.dry_run {
                    info!("Dry run: would publish {} items", items.len());
                } else {
                    let mut progress = SyncProgress {
                        phase: SyncPhase::Items,
                        processed: 0,
                        total: items.len(),
                        errors: 0,
                    };
                    match client.post_items(&items).await {
                        Ok(outcome) => {
                            result.items_inserted = outcome.inserted;
                            result.items_skipped = outcome.skipped;
                            progress.processed = items.len();
                        }
                        Err(err) => {
                            result.errors.push(format!("Items sync failed: {err}"));
                            progress.errors += 1;
                        }
                    }
                    notify(&progress);
                }
            }
            Err(err) => {
                result.errors.push(format!("Item extraction failed: {err}"));
            }
        }
    }

    // Stats phase: version-scoped, all-or-nothing.
    if !options.items_only && !options.dry_run {
        if let Err(err) = publish_stats(stats, client, &mut result, &notify).await {
            result.errors.push(err);
        }
    }

    // Cleanup only after a completely clean non-dry run.
    if !options.dry_run && result.errors.is_empty() {
        let mut progress = SyncProgress {
            phase: SyncPhase::Cleanup,
            processed: 0,
            total: 3,
            errors: 0,
        };
        match stats.cleanup() {
            Ok(()) => progress.processed = 3,
            Err(err) => {
                result.errors.push(format!("Cleanup failed: {err}"));
                progress.errors += 1;
            }
        }
        notify(&progress);
    }

    result
}

/// The versioned part of the publish. Returns an error string for the
/// result's error list; the abort path has already run by then.
async fn publish_stats(
    stats: &dyn StatsSource,
    client: &dyn RemoteClient,
    result: &mut SyncResult,
    notify: &impl Fn(&SyncProgress),
) -> Result<(), String> {
    let mut version: Option<String> = None;

    let outcome: Result<(), String> = async {
        let v = client
            .start_sync()
            .await
            .map_err(|err| format!("Stats sync failed: {err}"))?;
        version = Some(v.clone());

        let usage = stats
            .aggregate_usage()
            .map_err(|err| format!("Stats sync failed: {err}"))?;
        result.usage_inserted = client
            .post_usage(&v, &usage)
            .await
            .map_err(|err| format!("Stats sync failed: {err}"))?;
        notify(&SyncProgress {
            phase: SyncPhase::Usage,
            processed: usage.len(),
            total: usage.len(),
            errors: 0,
        });

        let pairs = stats
            .aggregate_pairs()
            .map_err(|err| format!("Stats sync failed: {err}"))?;
        result.pairs_inserted = client
            .post_pairs(&v, &pairs)
            .await
            .map_err(|err| format!("Stats sync failed: {err}"))?;
        notify(&SyncProgress {
            phase: SyncPhase::Pairs,
            processed: pairs.len(),
            total: pairs.len(),
            errors: 0,
        });

        client
            .commit_sync(&v)
            .await
            .map_err(|err| format!("Stats sync failed: {err}"))?;
        info!("Committed sync version {v}");
        Ok(())
    }
    .await;

    if let Err(err) = outcome {
        // Roll back the staged version so the active one stays intact.
        if let Some(v) = version {
            warn!("Stats publish failed, aborting version {v}");
            if let Err(abort_err) = client.abort_sync(&v).await {
                result.errors.push(format!("Abort failed: {abort_err}"));
            }
        }
        return Err(err);
    }
    Ok(())
}
