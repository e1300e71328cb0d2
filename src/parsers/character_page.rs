//! Parsers for the character detail page (glamour tooltips) and the item
//! detail page (item name for the catalog).

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{SLOT_BODY, SLOT_FEET, SLOT_HANDS, SLOT_HEAD, SLOT_LEGS};

static ITEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/lodestone/playguide/db/item/([^/]+)").unwrap());

/// One glamour (mirage) entry: the slot and the item projected onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlamourRow {
    pub slot_id: i64,
    pub item_id: String,
}

/// Map the tooltip category label to a tracked slot id. Categories outside
/// the five tracked slots (weapons, accessories) are ignored.
fn slot_id_for_category(category: &str) -> Option<i64> {
    match category {
        "頭防具" | "頭" => Some(SLOT_HEAD),
        "胴防具" | "胴" => Some(SLOT_BODY),
        "手防具" | "手" => Some(SLOT_HANDS),
        "脚防具" | "脚" => Some(SLOT_LEGS),
        "足防具" | "足" => Some(SLOT_FEET),
        _ => None,
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Extract glamour rows from a character page.
///
/// Each `.db-tooltip__item__mirage` block links to the projected item; the
/// slot comes from the surrounding tooltip's category label.
pub fn parse_glamour_rows(html: &str) -> Vec<GlamourRow> {
    let document = Html::parse_document(html);
    let mirage_sel = selector(".db-tooltip__item__mirage");
    let link_sel = selector("a");
    let category_sel = selector(".db-tooltip__item__category");

    let mut rows = Vec::new();
    for mirage in document.select(&mirage_sel) {
        let Some(item_id) = mirage
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| ITEM_ID_RE.captures(href))
            .map(|caps| caps[1].to_string())
        else {
            continue;
        };

        let Some(slot_id) = mirage
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|parent| {
                parent
                    .select(&category_sel)
                    .next()
                    .map(|el| el.text().collect::<String>())
            })
            .and_then(|category| slot_id_for_category(category.trim()))
        else {
            continue;
        };

        rows.push(GlamourRow { slot_id, item_id });
    }
    rows
}

/// Extract the item name from an item detail page (og:title meta tag).
pub fn parse_item_name(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&selector(r#"meta[property="og:title"]"#))
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tooltip(category: &str, item_id: &str) -> String {
        format!(
            r#"<div class="db-tooltip__item">
                <p class="db-tooltip__item__category">{category}</p>
                <div class="db-tooltip__item__mirage">
                    <a href="/lodestone/playguide/db/item/{item_id}/">mirage</a>
                </div>
            </div>"#
        )
    }

    #[test]
    fn extracts_tracked_slots() {
        let html = format!(
            "<html><body>{}{}</body></html>",
            tooltip("頭防具", "a4ea44d4e47"),
            tooltip("胴防具", "b1c2d3e4f56"),
        );
        let rows = parse_glamour_rows(&html);
        assert_eq!(
            rows,
            vec![
                GlamourRow {
                    slot_id: SLOT_HEAD,
                    item_id: "a4ea44d4e47".to_string()
                },
                GlamourRow {
                    slot_id: SLOT_BODY,
                    item_id: "b1c2d3e4f56".to_string()
                },
            ]
        );
    }

    #[test]
    fn ignores_untracked_categories() {
        let html = format!(
            "<html><body>{}{}</body></html>",
            tooltip("武器", "weapon1"),
            tooltip("指輪", "ring1"),
        );
        assert!(parse_glamour_rows(&html).is_empty());
    }

    #[test]
    fn skips_mirage_without_item_link() {
        let html = r#"<html><body>
            <div class="db-tooltip__item">
                <p class="db-tooltip__item__category">頭防具</p>
                <div class="db-tooltip__item__mirage"><a href="/other/"></a></div>
            </div>
        </body></html>"#;
        assert!(parse_glamour_rows(html).is_empty());
    }

    #[test]
    fn item_name_from_og_title() {
        let html = r#"<html><head>
            <meta property="og:title" content="モデルヴァートハット" />
        </head></html>"#;
        assert_eq!(
            parse_item_name(html),
            Some("モデルヴァートハット".to_string())
        );
        assert_eq!(parse_item_name("<html></html>"), None);
    }
}
