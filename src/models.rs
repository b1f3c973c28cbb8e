//! Data models for article candidates and their resolved publication dates.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ArticleCandidate`]: A discovered article URL and the ticker that found it
//! - [`FetchResult`]: The HTML (or the failure) retrieved for a candidate
//! - [`RawDateHit`]: An unparsed date value found by one extraction [`Strategy`]
//! - [`ResolvedArticle`]: A candidate with its final timestamp, if any
//! - [`RankedFeed`]: Resolved articles in display order
//!
//! Everything here lives for a single pipeline run; nothing is persisted.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::error::Error;
use std::fmt;

/// Marker shown in place of a timestamp for undated articles.
pub const UNKNOWN_DATE: &str = "Unknown date";

/// A news article URL discovered for a ticker symbol.
///
/// Produced by the discovery collaborator and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleCandidate {
    /// The article URL.
    pub url: String,
    /// The ticker or search term that produced this URL.
    pub source_query: String,
}

impl ArticleCandidate {
    pub fn new(url: impl Into<String>, source_query: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source_query: source_query.into(),
        }
    }
}

/// Why a fetch produced no HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FetchError {
    /// Connection, TLS, redirect or body transfer failure.
    Network(String),
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The server answered with a non-2xx status.
    HttpStatus(u16),
    /// The body could not be decoded with its declared or detected charset.
    Decode(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "network error: {msg}"),
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::HttpStatus(code) => write!(f, "http status {code}"),
            FetchError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl Error for FetchError {}

/// The outcome of fetching one candidate.
///
/// `outcome` holds either the decoded HTML or the reason there is none.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub candidate: ArticleCandidate,
    pub outcome: Result<String, FetchError>,
}

/// The extraction heuristic that produced a [`RawDateHit`].
///
/// Variants are declared in chain priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// `<meta>` publication tags and JSON-LD blocks.
    StructuredMetadata,
    /// `<time>` elements, date attributes, and "Published ..." labels.
    MarkupPattern,
    /// `/YYYY/MM/DD/` or `/YYYY-MM-DD/` in the article URL.
    UrlPath,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::StructuredMetadata => "structured_metadata",
            Strategy::MarkupPattern => "markup_pattern",
            Strategy::UrlPath => "url_path",
        }
    }

    /// Lower is more trusted.
    pub fn confidence_rank(self) -> u8 {
        match self {
            Strategy::StructuredMetadata => 0,
            Strategy::MarkupPattern => 1,
            Strategy::UrlPath => 2,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A date value exactly as a strategy found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDateValue {
    Text(String),
    /// Unix epoch; seconds or milliseconds depending on magnitude.
    Epoch(i64),
}

impl fmt::Display for RawDateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawDateValue::Text(s) => f.write_str(s),
            RawDateValue::Epoch(n) => write!(f, "{n}"),
        }
    }
}

/// An unparsed date candidate produced by the extractor.
///
/// `extracted_at` anchors relative phrases such as "3 days ago" and is the
/// reference instant for the plausibility bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDateHit {
    pub value: RawDateValue,
    pub strategy: Strategy,
    pub extracted_at: DateTime<Utc>,
}

impl RawDateHit {
    pub fn text(value: impl Into<String>, strategy: Strategy, extracted_at: DateTime<Utc>) -> Self {
        Self {
            value: RawDateValue::Text(value.into()),
            strategy,
            extracted_at,
        }
    }

    pub fn confidence_rank(&self) -> u8 {
        self.strategy.confidence_rank()
    }
}

/// How a candidate ended up dated or undated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Dated { strategy: Strategy },
    FetchFailed(FetchError),
    ExtractionEmpty,
    NormalizationEmpty,
}

/// A candidate paired with its resolved publication timestamp.
///
/// Build with [`ResolvedArticle::dated`] or [`ResolvedArticle::undated`] so
/// that `is_dated` always agrees with `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedArticle {
    #[serde(flatten)]
    pub candidate: ArticleCandidate,
    pub timestamp: Option<DateTime<Tz>>,
    pub is_dated: bool,
    pub resolution: Resolution,
}

impl ResolvedArticle {
    pub fn dated(candidate: ArticleCandidate, timestamp: DateTime<Tz>, strategy: Strategy) -> Self {
        Self {
            candidate,
            timestamp: Some(timestamp),
            is_dated: true,
            resolution: Resolution::Dated { strategy },
        }
    }

    /// `resolution` must not be [`Resolution::Dated`].
    pub fn undated(candidate: ArticleCandidate, resolution: Resolution) -> Self {
        debug_assert!(!matches!(resolution, Resolution::Dated { .. }));
        Self {
            candidate,
            timestamp: None,
            is_dated: false,
            resolution,
        }
    }

    /// The timestamp for display, or [`UNKNOWN_DATE`].
    pub fn date_label(&self) -> String {
        match &self.timestamp {
            Some(ts) => ts.format("%Y-%m-%d %H:%M %Z").to_string(),
            None => UNKNOWN_DATE.to_string(),
        }
    }
}

/// Resolved articles in display order: dated entries newest first, then
/// undated entries in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankedFeed {
    pub articles: Vec<ResolvedArticle>,
}

impl RankedFeed {
    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedArticle> {
        self.articles.iter()
    }

    pub fn dated_count(&self) -> usize {
        self.articles.iter().filter(|a| a.is_dated).count()
    }
}
