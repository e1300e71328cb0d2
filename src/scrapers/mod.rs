//! Production scraping implementations: the HTTP page fetcher and the
//! per-character glamour scraper.

mod character;
mod http_client;

pub use character::CharacterScraper;
pub use http_client::HttpPageFetcher;
