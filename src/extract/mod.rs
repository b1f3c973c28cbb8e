//! Publication-date extraction from article HTML.
//!
//! Each strategy is a plain function from a parsed [`Page`] to an optional
//! [`RawDateHit`]. The chain tries them in a fixed priority order and the
//! first one that yields a syntactically valid date wins; later strategies
//! are never consulted to "vote" against it.
//!
//! # Strategies
//!
//! | Priority | Strategy | Module | Looks at |
//! |----------|----------|--------|----------|
//! | 0 | Structured metadata | [`metadata`] | `<meta>` publication tags, JSON-LD |
//! | 1 | Markup pattern | [`markup`] | date attributes, "Published ..." labels, `<time>` |
//! | 2 | URL path | [`url_path`] | `/YYYY/MM/DD/` or `/YYYY-MM-DD/` in the URL |
//!
//! A strategy that meets malformed input (broken JSON-LD, odd attributes)
//! skips it and keeps scanning; nothing here returns an error.

use crate::grammar;
use crate::models::{RawDateHit, RawDateValue, Strategy};
use chrono::{DateTime, Utc};
use scraper::Html;
use tracing::{debug, instrument};

pub mod markup;
pub mod metadata;
pub mod url_path;

/// A fetched article as the strategies see it.
pub struct Page<'a> {
    pub document: &'a Html,
    pub url: &'a str,
    pub extracted_at: DateTime<Utc>,
}

/// One link in the fallback chain.
pub type StrategyFn = fn(&Page<'_>) -> Option<RawDateHit>;

/// The fallback chain in priority order.
pub const CHAIN: &[(Strategy, StrategyFn)] = &[
    (Strategy::StructuredMetadata, metadata::extract),
    (Strategy::MarkupPattern, markup::extract),
    (Strategy::UrlPath, url_path::extract),
];

/// Find the most trusted publication date in an article.
///
/// # Arguments
///
/// * `html` - The article body as fetched
/// * `url` - The article URL, consulted by the URL-path strategy
/// * `extracted_at` - Anchor for relative phrases such as "2 days ago"
///
/// # Returns
///
/// The first hit produced by [`CHAIN`], or `None` when no strategy finds a
/// date (the article is then undated, which is not an error).
#[instrument(level = "debug", skip(html), fields(bytes = html.len()))]
pub fn extract(html: &str, url: &str, extracted_at: DateTime<Utc>) -> Option<RawDateHit> {
    let document = Html::parse_document(html);
    let page = Page {
        document: &document,
        url,
        extracted_at,
    };
    run_chain(&page, CHAIN)
}

/// Try `chain` in order and return the first hit.
pub fn run_chain(page: &Page<'_>, chain: &[(Strategy, StrategyFn)]) -> Option<RawDateHit> {
    for (strategy, run) in chain {
        if let Some(hit) = run(page) {
            debug!(strategy = %strategy, value = %hit.value, "Date strategy matched");
            return Some(hit);
        }
        debug!(strategy = %strategy, "Date strategy found nothing");
    }
    None
}

/// True when `value` parses under one of the supported date grammars.
pub fn is_valid_date(value: &RawDateValue) -> bool {
    match value {
        RawDateValue::Text(s) => grammar::parse(s).is_some(),
        RawDateValue::Epoch(n) => grammar::parse_epoch(*n).is_some(),
    }
}

/// Wrap the first syntactically valid text value as a hit.
pub(crate) fn first_valid<I, S>(values: I, strategy: Strategy, page: &Page<'_>) -> Option<RawDateHit>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .find(|v| grammar::parse(v).is_some())
        .map(|v| RawDateHit::text(v, strategy, page.extracted_at))
}
