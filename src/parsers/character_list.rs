//! Parser for the Lodestone character search result page.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::crawler::{Candidate, ListingPage, ListingParser};

static CHARACTER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/lodestone/character/(\d+)/").unwrap());

// Pager text looks like "1ページ / 3ページ".
static PAGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)ページ\s*/\s*(\d+)ページ").unwrap());

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Parse one search result page into candidates plus pagination state.
pub fn parse_character_list(html: &str) -> ListingPage {
    let document = Html::parse_document(html);
    let entry_sel = selector(".entry");
    let link_sel = selector("a.entry__link");
    let level_sel = selector(".entry__chara_info li:first-child span");

    let mut candidates = Vec::new();
    for entry in document.select(&entry_sel) {
        let Some(href) = entry
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let Some(id) = CHARACTER_ID_RE
            .captures(href)
            .map(|c| c[1].to_string())
        else {
            continue;
        };

        let level_text: String = entry
            .select(&level_sel)
            .next()
            .map(|span| span.text().collect::<String>())
            .unwrap_or_default();
        let Ok(level) = level_text.trim().parse::<u32>() else {
            continue;
        };

        candidates.push(Candidate { id, level });
    }

    let pager_text: String = document
        .select(&selector(".btn__pager__current"))
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();
    let has_next_button = document.select(&selector(".btn__pager__next")).next().is_some();

    if let Some(caps) = PAGER_RE.captures(pager_text.trim()) {
        let current_page: u32 = caps[1].parse().unwrap_or(0);
        let total_pages: u32 = caps[2].parse().unwrap_or(0);
        return ListingPage {
            candidates,
            has_next_page: has_next_button && current_page < total_pages,
            current_page: Some(current_page),
            total_pages: Some(total_pages),
        };
    }

    ListingPage {
        candidates,
        has_next_page: has_next_button,
        current_page: None,
        total_pages: None,
    }
}

/// [`ListingParser`] implementation over [`parse_character_list`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LodestoneListingParser;

impl ListingParser for LodestoneListingParser {
    fn parse(&self, html: &str) -> ListingPage {
        parse_character_list(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, level: u32) -> String {
        format!(
            r#"<div class="entry">
                <a class="entry__link" href="/lodestone/character/{id}/"></a>
                <ul class="entry__chara_info"><li><span>{level}</span></li></ul>
            </div>"#
        )
    }

    #[test]
    fn extracts_ids_and_levels() {
        let html = format!("<html><body>{}{}</body></html>", entry("111", 100), entry("222", 97));
        let page = parse_character_list(&html);
        assert_eq!(
            page.candidates,
            vec![
                Candidate {
                    id: "111".to_string(),
                    level: 100
                },
                Candidate {
                    id: "222".to_string(),
                    level: 97
                },
            ]
        );
        assert!(!page.has_next_page);
    }

    #[test]
    fn skips_entries_without_id_or_level() {
        let html = r#"<html><body>
            <div class="entry"><a class="entry__link" href="/somewhere/else/"></a></div>
            <div class="entry">
                <a class="entry__link" href="/lodestone/character/333/"></a>
                <ul class="entry__chara_info"><li><span>not a number</span></li></ul>
            </div>
        </body></html>"#;
        let page = parse_character_list(html);
        assert!(page.candidates.is_empty());
    }

    #[test]
    fn parses_pager_state() {
        let html = format!(
            r#"<html><body>
                {}
                <li class="btn__pager__current">1ページ / 3ページ</li>
                <a class="btn__pager__next" href="?page=2"></a>
            </body></html>"#,
            entry("111", 100)
        );
        let page = parse_character_list(&html);
        assert_eq!(page.current_page, Some(1));
        assert_eq!(page.total_pages, Some(3));
        assert!(page.has_next_page);
    }

    #[test]
    fn last_page_has_no_next_even_with_button() {
        let html = r##"<html><body>
            <li class="btn__pager__current">3ページ / 3ページ</li>
            <a class="btn__pager__next" href="#"></a>
        </body></html>"##;
        let page = parse_character_list(html);
        assert!(!page.has_next_page);
    }

    #[test]
    fn missing_pager_falls_back_to_button_presence() {
        let page = parse_character_list("<html><body></body></html>");
        assert!(!page.has_next_page);
        assert_eq!(page.current_page, None);
        assert_eq!(page.total_pages, None);
    }
}
