//! Listing walker: paginate one search key's result listing.
//!
//! Listings are sorted by level descending, so the first row below the
//! minimum level ends both the page scan and the pagination. A hard page cap
//! bounds worst-case work against malformed pagination markup.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::CrawlerSettings;

use super::fetcher::PageFetcher;
use super::search_key::{build_search_url, SearchKey};

/// One listing row: a character id and its level (the sort field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub level: u32,
}

/// Parsed view of one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub candidates: Vec<Candidate>,
    pub has_next_page: bool,
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
}

/// Structural parsing of listing markup, injected so the walker stays free
/// of HTML concerns. Production implementation lives in
/// `parsers::character_list`.
pub trait ListingParser: Send + Sync {
    fn parse(&self, html: &str) -> ListingPage;
}

/// Source of qualifying candidate ids for a search key. The orchestrator
/// depends on this seam, not on HTTP.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn candidate_ids(&self, key: &SearchKey) -> Vec<String>;
}

/// Walks a key's listing pages through a fetcher and parser.
pub struct ListingWalker<F, P> {
    fetcher: F,
    parser: P,
    min_level: u32,
    max_pages: u32,
}

impl<F: PageFetcher, P: ListingParser> ListingWalker<F, P> {
    pub fn new(fetcher: F, parser: P, settings: &CrawlerSettings) -> Self {
        Self {
            fetcher,
            parser,
            min_level: settings.min_level,
            max_pages: settings.max_pages,
        }
    }
}

#[async_trait]
impl<F: PageFetcher, P: ListingParser> CandidateSource for ListingWalker<F, P> {
    async fn candidate_ids(&self, key: &SearchKey) -> Vec<String> {
        let mut ids = Vec::new();
        let mut page = 1;

        loop {
            if page > self.max_pages {
                warn!("Reached max page limit ({}), stopping", self.max_pages);
                break;
            }

            let url = build_search_url(key, (page > 1).then_some(page));
            info!("Fetching {url}");

            let result = self.fetcher.fetch(&url).await;
            let Some(body) = result.body.filter(|_| result.success) else {
                warn!(
                    "Fetch failed for page {page} (status {}): {}",
                    result.status,
                    result.error.as_deref().unwrap_or("unknown")
                );
                break;
            };

            let parsed = self.parser.parse(&body);
            if let (Some(current), Some(total)) = (parsed.current_page, parsed.total_pages) {
                info!(
                    "Page {current}/{total}, found {} candidates",
                    parsed.candidates.len()
                );
            }

            if parsed.candidates.is_empty() {
                info!("No candidates found");
                break;
            }

            // Listing is level-descending: the first row below the minimum
            // level disqualifies everything after it.
            let mut below_threshold = false;
            for candidate in &parsed.candidates {
                if candidate.level >= self.min_level {
                    ids.push(candidate.id.clone());
                } else {
                    info!(
                        "Found level {} < {}, early termination",
                        candidate.level, self.min_level
                    );
                    below_threshold = true;
                    break;
                }
            }
            if below_threshold || !parsed.has_next_page {
                break;
            }

            page += 1;
        }

        info!("Total {} candidates found", ids.len());
        ids
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::super::fetcher::FetchResult;
    use super::*;

    /// Parser mapping exact page bodies to pre-built listing pages.
    struct FixtureParser {
        pages: HashMap<String, ListingPage>,
    }

    impl ListingParser for FixtureParser {
        fn parse(&self, html: &str) -> ListingPage {
            self.pages.get(html).cloned().unwrap_or_default()
        }
    }

    /// Fetcher serving "page:N" bodies keyed by the page query parameter.
    struct PageFetcherStub {
        fetched: AtomicUsize,
        fail_from_page: Option<u32>,
    }

    #[async_trait]
    impl PageFetcher for PageFetcherStub {
        async fn fetch(&self, url: &str) -> FetchResult {
            self.fetched.fetch_add(1, Ordering::SeqCst);
            let page: u32 = url
                .split("page=")
                .nth(1)
                .and_then(|p| p.parse().ok())
                .unwrap_or(1);
            if self.fail_from_page.is_some_and(|p| page >= p) {
                return FetchResult::failed(503, "unavailable");
            }
            FetchResult::ok(200, format!("page:{page}"))
        }
    }

    fn candidate(id: &str, level: u32) -> Candidate {
        Candidate {
            id: id.to_string(),
            level,
        }
    }

    fn walker(
        pages: HashMap<String, ListingPage>,
        fail_from_page: Option<u32>,
    ) -> ListingWalker<PageFetcherStub, FixtureParser> {
        ListingWalker::new(
            PageFetcherStub {
                fetched: AtomicUsize::new(0),
                fail_from_page,
            },
            FixtureParser { pages },
            &CrawlerSettings::default(),
        )
    }

    fn key() -> SearchKey {
        SearchKey {
            origin_index: 0,
            world: "Tiamat".to_string(),
            classjob: 19,
            race_tribe: "tribe_1".to_string(),
            gc_id: 1,
        }
    }

    #[tokio::test]
    async fn below_threshold_row_stops_pagination() {
        // Page 2 holds one qualifying row then a level-99 row; page 3 must
        // never be fetched.
        let pages = HashMap::from([
            (
                "page:1".to_string(),
                ListingPage {
                    candidates: vec![candidate("a", 100), candidate("b", 100)],
                    has_next_page: true,
                    current_page: Some(1),
                    total_pages: Some(3),
                },
            ),
            (
                "page:2".to_string(),
                ListingPage {
                    candidates: vec![candidate("c", 100), candidate("d", 99), candidate("e", 100)],
                    has_next_page: true,
                    current_page: Some(2),
                    total_pages: Some(3),
                },
            ),
        ]);

        let walker = walker(pages, None);
        let ids = walker.candidate_ids(&key()).await;

        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(walker.fetcher.fetched.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stops_on_last_page() {
        let pages = HashMap::from([(
            "page:1".to_string(),
            ListingPage {
                candidates: vec![candidate("a", 100)],
                has_next_page: false,
                ..Default::default()
            },
        )]);

        let ids = walker(pages, None).candidate_ids(&key()).await;
        assert_eq!(ids, vec!["a"]);
    }

    #[tokio::test]
    async fn empty_page_stops() {
        let pages = HashMap::from([(
            "page:1".to_string(),
            ListingPage {
                candidates: vec![],
                has_next_page: true,
                ..Default::default()
            },
        )]);

        let ids = walker(pages, None).candidate_ids(&key()).await;
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_returns_collected_so_far() {
        let pages = HashMap::from([(
            "page:1".to_string(),
            ListingPage {
                candidates: vec![candidate("a", 100)],
                has_next_page: true,
                ..Default::default()
            },
        )]);

        let ids = walker(pages, Some(2)).candidate_ids(&key()).await;
        assert_eq!(ids, vec!["a"]);
    }

    #[tokio::test]
    async fn page_cap_bounds_malformed_pagination() {
        // Every page claims a next page; the cap has to end the walk.
        let mut pages = HashMap::new();
        for p in 1..=200 {
            pages.insert(
                format!("page:{p}"),
                ListingPage {
                    candidates: vec![candidate(&format!("c{p}"), 100)],
                    has_next_page: true,
                    ..Default::default()
                },
            );
        }

        let walker = walker(pages, None);
        let ids = walker.candidate_ids(&key()).await;
        assert_eq!(ids.len(), 100);
        assert_eq!(walker.fetcher.fetched.load(Ordering::SeqCst), 100);
    }
}
