//! Crawl orchestration over the Lodestone search key space.
//!
//! The crawl is strictly sequential by policy (one in-flight fetch at a
//! time) to respect upstream rate limits. Restart safety comes from per-key
//! progress checkpoints, not from any in-process state.

mod fetcher;
mod listing;
mod orchestrator;
mod progress;
mod search_key;
mod shuffle;

pub use fetcher::{FetchResult, PageFetcher, RetryConfig, RetryingFetcher};
pub use listing::{Candidate, CandidateSource, ListingPage, ListingParser, ListingWalker};
pub use orchestrator::{
    Crawler, CrawlerConfig, CrawlState, CrawlStats, SubjectIndex, SubjectProcessor,
};
pub use progress::{MemoryProgressStore, ProgressStore};
pub use search_key::{
    all_jp_worlds, build_search_url, resolve_worlds, SearchKey, SearchKeySpace, CLASSJOBS,
    DATA_CENTERS, GC_IDS, RACE_TRIBES,
};
pub use shuffle::{shuffle, SeededRng};
