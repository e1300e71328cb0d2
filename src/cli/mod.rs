//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::aggregate::Aggregator;
use crate::config::Settings;
use crate::crawler::{
    Crawler, CrawlerConfig, ListingWalker, RetryConfig, RetryingFetcher, SearchKeySpace,
};
use crate::parsers::LodestoneListingParser;
use crate::repository::StagingRepository;
use crate::scrapers::{CharacterScraper, HttpPageFetcher};
use crate::sync::{format_progress, run_sync, HttpRemoteClient, SyncOptions};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "glamscrape")]
#[command(about = "Lodestone glamour data acquisition and aggregation system")]
#[command(version)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, default_value = "glamscrape.toml")]
    config: PathBuf,

    /// Data directory (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the staging database
    Init,

    /// Crawl the Lodestone search space and stage glamour data
    Crawl {
        /// Print the generated key sequence without fetching anything
        #[arg(long)]
        dry_run: bool,
        /// Shuffle seed (must match the checkpointed run when resuming)
        #[arg(long)]
        seed: Option<u32>,
        /// Job name keying the progress checkpoint
        #[arg(long)]
        job_name: Option<String>,
        /// Restrict the crawl to one data center
        #[arg(long)]
        data_center: Option<String>,
        /// Restrict the crawl to specific worlds
        #[arg(long)]
        world: Vec<String>,
    },

    /// Publish aggregates to the remote read-store
    Sync {
        /// Compute aggregates without touching the remote store
        #[arg(long)]
        dry_run: bool,
        /// Publish only the item catalog
        #[arg(long, conflicts_with = "stats_only")]
        items_only: bool,
        /// Publish only the versioned statistics
        #[arg(long)]
        stats_only: bool,
        /// Bearer token for the remote API
        #[arg(long, env = "GLAMSCRAPE_AUTH_TOKEN", hide_env_values = true)]
        auth_token: Option<String>,
    },

    /// Show crawl progress and staging totals
    Status,
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = Some(data_dir);
    }

    match cli.command {
        Commands::Init => init(&settings),
        Commands::Crawl {
            dry_run,
            seed,
            job_name,
            data_center,
            world,
        } => {
            if let Some(seed) = seed {
                settings.crawler.seed = seed;
            }
            if let Some(job_name) = job_name {
                settings.crawler.job_name = job_name;
            }
            if data_center.is_some() {
                settings.crawler.data_center = data_center;
            }
            if !world.is_empty() {
                settings.crawler.worlds = world;
            }
            crawl(&settings, dry_run).await
        }
        Commands::Sync {
            dry_run,
            items_only,
            stats_only,
            auth_token,
        } => {
            if auth_token.is_some() {
                settings.sync.auth_token = auth_token;
            }
            sync(
                &settings,
                SyncOptions {
                    dry_run,
                    items_only,
                    stats_only,
                },
            )
            .await
        }
        Commands::Status => status(&settings),
    }
}

fn init(settings: &Settings) -> anyhow::Result<()> {
    let db_path = settings.db_path();
    StagingRepository::new(&db_path)?;
    println!("Initialized staging database at {}", db_path.display());
    Ok(())
}

async fn crawl(settings: &Settings, dry_run: bool) -> anyhow::Result<()> {
    let repository = Arc::new(StagingRepository::new(&settings.db_path())?);
    let key_space = SearchKeySpace::from_settings(&settings.crawler);

    let fetcher = Arc::new(RetryingFetcher::new(
        HttpPageFetcher::new(
            HTTP_TIMEOUT,
            Duration::from_millis(settings.fetch.request_delay_ms),
        ),
        RetryConfig::from_settings(&settings.fetch),
    ));
    let walker = ListingWalker::new(
        fetcher.clone(),
        LodestoneListingParser,
        &settings.crawler,
    );
    let scraper = CharacterScraper::new(fetcher, repository.clone());

    let total_keys = key_space.total_count() as u64;
    let bar = if dry_run {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(total_keys);
        bar.set_style(
            ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} keys | {msg}",
            )?,
        );
        bar
    };
    let observer_bar = bar.clone();

    let mut crawler = Crawler::new(
        CrawlerConfig {
            job_name: settings.crawler.job_name.clone(),
            dry_run,
        },
        key_space,
        Arc::new(walker),
        repository.clone(),
        repository,
        Arc::new(scraper),
    )
    .with_key_observer(Box::new(move |stats| {
        observer_bar.set_position(stats.processed_keys);
        observer_bar.set_message(format!(
            "{} chars, {} skipped, {} errors",
            stats.processed_characters, stats.skipped_characters, stats.errors
        ));
    }));

    let stats = crawler.run().await?;
    bar.finish_and_clear();

    println!("{}", style("Crawl finished").green().bold());
    println!(
        "  Keys: {}/{}  Characters: {}  Skipped: {}  Errors: {}",
        stats.processed_keys,
        stats.total_keys,
        stats.processed_characters,
        stats.skipped_characters,
        stats.errors
    );
    Ok(())
}

async fn sync(settings: &Settings, options: SyncOptions) -> anyhow::Result<()> {
    let repository = Arc::new(StagingRepository::new(&settings.db_path())?);
    let aggregator = Aggregator::new(repository);

    let auth_token = settings.sync.auth_token.clone().unwrap_or_default();
    if !options.dry_run {
        if settings.sync.base_url.is_empty() {
            bail!("No sync base URL configured (set [sync] base_url or GLAMSCRAPE_SYNC_URL)");
        }
        if auth_token.is_empty() {
            bail!("No auth token configured (set GLAMSCRAPE_AUTH_TOKEN)");
        }
    }
    let client = HttpRemoteClient::new(&settings.sync, auth_token);

    let observer = |progress: &crate::sync::SyncProgress| {
        println!("{}", format_progress(progress));
    };
    let result = run_sync(&aggregator, &client, options, Some(&observer)).await;

    println!(
        "Items: {} inserted, {} skipped | Usage: {} | Pairs: {}",
        result.items_inserted, result.items_skipped, result.usage_inserted, result.pairs_inserted
    );
    if !result.errors.is_empty() {
        for error in &result.errors {
            eprintln!("{} {error}", style("error:").red().bold());
        }
        bail!("Sync finished with {} error(s)", result.errors.len());
    }
    println!("{}", style("Sync finished").green().bold());
    Ok(())
}

fn status(settings: &Settings) -> anyhow::Result<()> {
    let repository = StagingRepository::new(&settings.db_path())?;
    match repository.any_progress()? {
        Some(progress) => {
            let complete = progress.last_completed_index >= progress.total_keys - 1;
            println!("Job: {}", progress.job_name);
            println!(
                "Progress: {}/{} keys (seed {})",
                progress.last_completed_index + 1,
                progress.total_keys,
                progress.seed
            );
            println!("Characters processed: {}", progress.processed_characters);
            println!("Updated: {}", progress.updated_at);
            println!(
                "Status: {}",
                if complete {
                    style("complete").green()
                } else {
                    style("in progress").yellow()
                }
            );
        }
        None => println!("No crawl progress recorded"),
    }
    Ok(())
}
