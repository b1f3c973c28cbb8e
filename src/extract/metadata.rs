//! Structured-metadata strategy.
//!
//! Scans `<meta>` publication tags, microdata `itemprop="datePublished"`
//! elements and `application/ld+json` blocks in document order and returns
//! the first one carrying a valid date.

use super::{Page, is_valid_date};
use crate::models::{RawDateHit, RawDateValue, Strategy};
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use serde_json::Value;
use tracing::debug;

static METADATA: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta, script[type="application/ld+json"], [itemprop="datePublished"]"#)
        .expect("metadata selector")
});

/// Lowercased `property` / `name` / `itemprop` keys that carry a
/// publication date.
const PUBLISHED_KEYS: &[&str] = &[
    "article:published_time",
    "og:article:published_time",
    "article:published",
    "published_time",
    "datepublished",
    "date_published",
    "publishdate",
    "publish_date",
    "publish-date",
    "pubdate",
    "pub_date",
    "date",
    "dc.date",
    "dc.date.issued",
    "dc.date.created",
    "dcterms.created",
    "dcterms.date",
    "dcterms.issued",
    "sailthru.date",
    "parsely-pub-date",
    "article.published",
    "article_date_original",
    "original-publish-date",
    "cxenseparse:recs:publishtime",
    "displaydate",
];

/// JSON-LD keys, most specific first.
const JSON_LD_KEYS: &[&str] = &["datePublished", "dateCreated", "uploadDate"];

pub fn extract(page: &Page<'_>) -> Option<RawDateHit> {
    for element in page.document.select(&METADATA) {
        let value = match element.value().name() {
            "meta" => meta_date(element),
            "script" => json_ld_date(&element.text().collect::<String>()),
            _ => microdata_date(element),
        };
        if let Some(value) = value.filter(is_valid_date) {
            return Some(RawDateHit {
                value,
                strategy: Strategy::StructuredMetadata,
                extracted_at: page.extracted_at,
            });
        }
    }
    None
}

fn meta_date(element: ElementRef<'_>) -> Option<RawDateValue> {
    let el = element.value();
    let key = el
        .attr("property")
        .or_else(|| el.attr("name"))
        .or_else(|| el.attr("itemprop"))?
        .trim()
        .to_ascii_lowercase();
    if !PUBLISHED_KEYS.contains(&key.as_str()) {
        return None;
    }
    let content = el.attr("content")?.trim();
    (!content.is_empty()).then(|| RawDateValue::Text(content.to_string()))
}

fn microdata_date(element: ElementRef<'_>) -> Option<RawDateValue> {
    let el = element.value();
    let raw = el
        .attr("content")
        .or_else(|| el.attr("datetime"))
        .map(str::to_string)
        .unwrap_or_else(|| element.text().collect::<String>());
    let raw = raw.trim();
    (!raw.is_empty()).then(|| RawDateValue::Text(raw.to_string()))
}

/// Pull a publication date out of a JSON-LD block.
///
/// Invalid JSON is logged and skipped.
pub fn json_ld_date(raw: &str) -> Option<RawDateValue> {
    let content = raw
        .trim()
        .trim_start_matches("<![CDATA[")
        .trim_end_matches("]]>")
        .trim();
    let parsed: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, block = %truncate_for_log(content, 120), "Skipping malformed JSON-LD block");
            return None;
        }
    };
    JSON_LD_KEYS
        .iter()
        .find_map(|key| find_date_field(&parsed, key))
}

/// Depth-first search for `key`, visiting arrays and `@graph` in order.
fn find_date_field(value: &Value, key: &str) -> Option<RawDateValue> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key).and_then(date_value) {
                return Some(found);
            }
            map.values().find_map(|v| find_date_field(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_date_field(v, key)),
        _ => None,
    }
}

fn date_value(value: &Value) -> Option<RawDateValue> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(RawDateValue::Text(s.trim().to_string())),
        Value::Number(n) => n.as_i64().map(RawDateValue::Epoch),
        Value::Array(items) => items.iter().find_map(date_value),
        Value::Object(map) => map.get("@value").and_then(date_value),
        _ => None,
    }
}
