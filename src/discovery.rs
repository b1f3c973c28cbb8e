//! Candidate discovery: turning ticker symbols into article URLs.
//!
//! The date pipeline does not care where candidates come from. This module
//! provides the two sources the binary uses:
//! - [`GoogleNewsDiscovery`]: one Google News RSS search per ticker
//! - [`parse_candidate_lines`]: a fixed `SYMBOL URL` list, for offline runs

use crate::config::PipelineConfig;
use crate::models::ArticleCandidate;
use chrono::NaiveDate;
use serde::Deserialize;
use std::error::Error;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

pub const GOOGLE_NEWS_RSS: &str = "https://news.google.com/rss/search";

/// Load ticker symbols, one per line.
///
/// Blank lines are skipped and surrounding whitespace trimmed.
#[instrument(level = "info")]
pub async fn load_symbols(path: &str) -> Result<Vec<String>, Box<dyn Error>> {
    let text = tokio::fs::read_to_string(path).await?;
    let symbols = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    info!(count = symbols.len(), "Loaded ticker symbols");
    Ok(symbols)
}

/// The search phrase used for `symbol` on `date`.
pub fn news_query(symbol: &str, date: NaiveDate) -> String {
    format!("{symbol} stock news {}", date.format("%Y-%m-%d"))
}

/// Parse `SYMBOL URL` lines into candidates, in file order.
///
/// `#` comments and blank lines are ignored; malformed lines are skipped.
pub fn parse_candidate_lines(text: &str) -> Vec<ArticleCandidate> {
    text.lines()
        .enumerate()
        .filter_map(|(n, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(symbol), Some(url), None) if url.starts_with("http") => {
                    Some(ArticleCandidate::new(url, symbol))
                }
                _ => {
                    warn!(line = n + 1, content = line, "Skipping malformed candidate line");
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    link: Option<String>,
}

/// Article links from an RSS document, in feed order.
pub fn rss_links(xml: &str) -> Result<Vec<String>, Box<dyn Error>> {
    let rss: Rss = quick_xml::de::from_str(xml)?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| item.link)
        .map(|link| link.trim().to_string())
        .filter(|link| !link.is_empty())
        .collect())
}

/// Searches Google News RSS once per ticker.
#[derive(Debug, Clone)]
pub struct GoogleNewsDiscovery {
    client: reqwest::Client,
    base_url: String,
    results_per_symbol: usize,
    delay: Duration,
}

impl GoogleNewsDiscovery {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout()?)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            base_url: GOOGLE_NEWS_RSS.to_string(),
            results_per_symbol: config.results_per_symbol,
            delay: Duration::from_millis(config.discovery_delay_ms),
        })
    }

    /// Point searches at another RSS endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Candidates for every symbol, grouped by symbol in input order.
    ///
    /// A failed search is logged and contributes nothing; the others still run.
    #[instrument(level = "info", skip_all, fields(symbols = symbols.len(), %date))]
    pub async fn discover(&self, symbols: &[String], date: NaiveDate) -> Vec<ArticleCandidate> {
        let mut candidates = Vec::new();
        for symbol in symbols {
            sleep(self.delay).await;
            match self.search(symbol, date).await {
                Ok(links) => {
                    debug!(%symbol, count = links.len(), "Discovered links");
                    candidates.extend(links.into_iter().map(|url| ArticleCandidate::new(url, symbol.as_str())));
                }
                Err(e) => warn!(%symbol, error = %e, "News search failed; skipping symbol"),
            }
        }
        info!(count = candidates.len(), "Discovery complete");
        candidates
    }

    async fn search(&self, symbol: &str, date: NaiveDate) -> Result<Vec<String>, Box<dyn Error>> {
        let query = news_query(symbol, date);
        let url = format!(
            "{}?q={}&hl=en-US&gl=US&ceid=US:en",
            self.base_url,
            urlencoding::encode(&query)
        );
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let xml = response.text().await?;
        let mut links = rss_links(&xml)?;
        links.truncate(self.results_per_symbol);
        Ok(links)
    }
}
