//! HTML parsers for Lodestone pages.
//!
//! Structural parsing only; the crawl and scrape layers decide what to do
//! with the extracted records.

mod character_list;
mod character_page;

pub use character_list::{parse_character_list, LodestoneListingParser};
pub use character_page::{parse_glamour_rows, parse_item_name, GlamourRow};
