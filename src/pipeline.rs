//! Per-article orchestration: fetch, extract, normalize, then rank.
//!
//! Each candidate moves through
//! `Pending -> Fetched | FetchFailed -> Extracted | ExtractionEmpty -> Normalized | NormalizationEmpty`
//! and always ends as a [`ResolvedArticle`], dated or not. A failure for
//! one candidate never affects another, and no candidate the caller
//! supplied is dropped.
//!
//! Candidates are processed concurrently, at most `max_concurrent` fetches
//! at a time. Results are put back in discovery order before ranking, so
//! the feed never depends on which fetch finished first.

use crate::extract;
use crate::fetcher::{self, FetchCache, FetchPage};
use crate::models::{ArticleCandidate, FetchResult, RankedFeed, Resolution, ResolvedArticle};
use crate::normalize::Normalizer;
use crate::rank::rank;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::fmt;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Returned when the caller cancels a run before it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("pipeline run was cancelled")
    }
}

impl Error for Cancelled {}

/// Resolves a batch of candidates into a [`RankedFeed`].
///
/// Generic over the fetcher so tests can serve canned pages.
pub struct Pipeline<F> {
    fetcher: F,
    normalizer: Normalizer,
    max_concurrent: usize,
    cache: Option<Box<dyn FetchCache + Send + Sync>>,
    pinned_now: Option<DateTime<Utc>>,
}

impl<F> fmt::Debug for Pipeline<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("normalizer", &self.normalizer)
            .field("max_concurrent", &self.max_concurrent)
            .field("has_cache", &self.cache.is_some())
            .field("pinned_now", &self.pinned_now)
            .finish()
    }
}

impl<F> Pipeline<F>
where
    F: FetchPage,
{
    /// Create a pipeline with no cache that reads the wall clock.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Source of article HTML
    /// * `normalizer` - Turns extracted dates into display timestamps
    /// * `max_concurrent` - Upper bound on in-flight fetches; zero is treated as one
    pub fn new(fetcher: F, normalizer: Normalizer, max_concurrent: usize) -> Self {
        Self {
            fetcher,
            normalizer,
            max_concurrent: max_concurrent.max(1),
            cache: None,
            pinned_now: None,
        }
    }

    /// Consult `cache` before fetching each URL.
    pub fn with_cache(mut self, cache: impl FetchCache + Send + Sync + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    /// Use a fixed extraction instant instead of the wall clock.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.pinned_now = Some(now);
        self
    }

    /// The normalizer, for callers that need its display zone.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Resolve and rank every candidate.
    ///
    /// # Returns
    ///
    /// The ranked feed, or [`Cancelled`] if `cancel` fires first. In-flight
    /// fetches are dropped on cancellation and no partial feed is returned.
    #[instrument(level = "info", skip_all, fields(candidates = candidates.len()))]
    pub async fn process(
        &self,
        candidates: Vec<ArticleCandidate>,
        cancel: &CancellationToken,
    ) -> Result<RankedFeed, Cancelled> {
        let t0 = Instant::now();
        let total = candidates.len();

        let run = stream::iter(candidates.into_iter().enumerate())
            .map(|(index, candidate)| async move { (index, self.resolve(candidate).await) })
            .buffer_unordered(self.max_concurrent)
            .collect::<Vec<(usize, ResolvedArticle)>>();

        let mut resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(total, elapsed_ms = t0.elapsed().as_millis() as u64, "Pipeline run cancelled");
                return Err(Cancelled);
            }
            resolved = run => resolved,
        };

        resolved.sort_by_key(|(index, _)| *index);
        let feed = rank(resolved.into_iter().map(|(_, article)| article));

        info!(
            total,
            dated = feed.dated_count(),
            undated = total - feed.dated_count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Pipeline run complete"
        );
        Ok(feed)
    }

    /// Take one candidate to its terminal state.
    #[instrument(level = "debug", skip_all, fields(url = %candidate.url, source_query = %candidate.source_query))]
    pub async fn resolve(&self, candidate: ArticleCandidate) -> ResolvedArticle {
        let fetched = self.fetch(candidate).await;
        let FetchResult { candidate, outcome } = fetched;
        let html = match outcome {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %candidate.url, error = %e, "Fetch failed; article left undated");
                return ResolvedArticle::undated(candidate, Resolution::FetchFailed(e));
            }
        };
        self.resolve_html(candidate, &html)
    }

    /// Extract and normalize a date from already-fetched HTML.
    pub fn resolve_html(&self, candidate: ArticleCandidate, html: &str) -> ResolvedArticle {
        let extracted_at = self.pinned_now.unwrap_or_else(Utc::now);

        let Some(hit) = extract::extract(html, &candidate.url, extracted_at) else {
            debug!(url = %candidate.url, "No date strategy matched");
            return ResolvedArticle::undated(candidate, Resolution::ExtractionEmpty);
        };

        match self.normalizer.normalize(&hit) {
            Some(timestamp) => {
                debug!(
                    url = %candidate.url,
                    strategy = %hit.strategy,
                    confidence = hit.confidence_rank(),
                    %timestamp,
                    "Article dated"
                );
                ResolvedArticle::dated(candidate, timestamp, hit.strategy)
            }
            None => {
                debug!(url = %candidate.url, strategy = %hit.strategy, value = %hit.value, "Date rejected by normalizer");
                ResolvedArticle::undated(candidate, Resolution::NormalizationEmpty)
            }
        }
    }

    async fn fetch(&self, candidate: ArticleCandidate) -> FetchResult {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.lookup(&candidate.url)) {
            debug!(url = %candidate.url, "Using cached page");
            return FetchResult {
                candidate,
                outcome: cached.outcome,
            };
        }
        fetcher::fetch(&self.fetcher, candidate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FetchError, Strategy};
    use chrono::{Datelike, TimeDelta, TimeZone};
    use chrono_tz::America::New_York;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Serves canned pages; unknown URLs fail with a network error.
    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, Result<String, FetchError>>,
        delays: HashMap<String, Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeFetcher {
        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), Ok(html.to_string()));
            self
        }

        fn failing(mut self, url: &str, error: FetchError) -> Self {
            self.pages.insert(url.to_string(), Err(error));
            self
        }

        fn delayed(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_string(), delay);
            self
        }
    }

    impl FetchPage for FakeFetcher {
        async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            self.pages
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Network("connection refused".into())))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn pipeline(fetcher: FakeFetcher) -> Pipeline<FakeFetcher> {
        let normalizer = Normalizer::new(New_York, New_York, TimeDelta::try_days(1).unwrap());
        Pipeline::new(fetcher, normalizer, 4).with_now(now())
    }

    const META_PAGE: &str = r#"<html><head><meta property="article:published_time" content="2024-05-01T10:00:00Z"></head><body></body></html>"#;
    const PLAIN_PAGE: &str = "<html><body><p>Shares rose.</p></body></html>";

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let a = ArticleCandidate::new("https://news.example.com/aapl-earnings", "AAPL");
        let b = ArticleCandidate::new("https://finance.example.com/2024/04/20/aapl-supply-chain/", "AAPL");
        let c = ArticleCandidate::new("https://blocked.example.com/aapl", "AAPL");

        let fetcher = FakeFetcher::default()
            .page(&a.url, META_PAGE)
            .page(&b.url, PLAIN_PAGE)
            .failing(&c.url, FetchError::HttpStatus(403));

        let feed = pipeline(fetcher)
            .process(vec![c.clone(), b.clone(), a.clone()], &CancellationToken::new())
            .await
            .unwrap();

        let urls: Vec<_> = feed.iter().map(|r| r.candidate.url.clone()).collect();
        assert_eq!(urls, vec![a.url.clone(), b.url.clone(), c.url.clone()]);

        let first = &feed.articles[0];
        assert_eq!(first.resolution, Resolution::Dated { strategy: Strategy::StructuredMetadata });
        assert_eq!(
            first.timestamp.unwrap().with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );

        let second = feed.articles[1].timestamp.unwrap().with_timezone(&New_York);
        assert_eq!((second.year(), second.month(), second.day()), (2024, 4, 20));
        assert_eq!(feed.articles[1].resolution, Resolution::Dated { strategy: Strategy::UrlPath });

        assert!(!feed.articles[2].is_dated);
        assert_eq!(
            feed.articles[2].resolution,
            Resolution::FetchFailed(FetchError::HttpStatus(403))
        );
    }

    #[tokio::test]
    async fn test_timeout_becomes_undated_not_error() {
        let c = ArticleCandidate::new("https://slow.example.com/x", "MSFT");
        let fetcher = FakeFetcher::default().failing(&c.url, FetchError::Timeout);
        let feed = pipeline(fetcher)
            .process(vec![c.clone()], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(feed.len(), 1);
        assert!(!feed.articles[0].is_dated);
        assert_eq!(feed.articles[0].resolution, Resolution::FetchFailed(FetchError::Timeout));
    }

    #[tokio::test]
    async fn test_every_candidate_is_kept() {
        let candidates: Vec<_> = (0..12)
            .map(|i| ArticleCandidate::new(format!("https://example.com/{i}"), "TSLA"))
            .collect();
        let feed = pipeline(FakeFetcher::default())
            .process(candidates.clone(), &CancellationToken::new())
            .await
            .unwrap();
        let urls: Vec<_> = feed.iter().map(|r| r.candidate.clone()).collect();
        assert_eq!(urls, candidates);
    }

    #[tokio::test]
    async fn test_order_independent_of_completion() {
        let first = ArticleCandidate::new("https://example.com/first", "NVDA");
        let second = ArticleCandidate::new("https://example.com/second", "NVDA");
        let fetcher = FakeFetcher::default()
            .page(&first.url, PLAIN_PAGE)
            .page(&second.url, PLAIN_PAGE)
            .delayed(&first.url, Duration::from_millis(50));

        let feed = pipeline(fetcher)
            .process(vec![first.clone(), second.clone()], &CancellationToken::new())
            .await
            .unwrap();
        let urls: Vec<_> = feed.iter().map(|r| r.candidate.url.clone()).collect();
        assert_eq!(urls, vec![first.url, second.url]);
        assert!(feed.iter().all(|r| r.resolution == Resolution::ExtractionEmpty));
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let pages = [
            ("https://example.com/a", META_PAGE),
            ("https://example.com/2024/04/20/b", PLAIN_PAGE),
            ("https://example.com/c", "<p>Updated 3 days ago</p>"),
            ("https://example.com/d", PLAIN_PAGE),
        ];
        let mut fetcher = FakeFetcher::default();
        for (url, html) in pages {
            fetcher = fetcher.page(url, html);
        }
        let candidates: Vec<_> = pages
            .iter()
            .map(|(url, _)| ArticleCandidate::new(*url, "AMD"))
            .collect();

        let p = pipeline(fetcher);
        let first = p.process(candidates.clone(), &CancellationToken::new()).await.unwrap();
        let second = p.process(candidates, &CancellationToken::new()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.dated_count(), 3);
    }

    #[tokio::test]
    async fn test_implausible_date_is_normalization_empty() {
        let c = ArticleCandidate::new("https://example.com/future", "IBM");
        let fetcher = FakeFetcher::default().page(
            &c.url,
            r#"<meta name="date" content="2099-01-01T00:00:00Z">"#,
        );
        let feed = pipeline(fetcher)
            .process(vec![c], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(feed.articles[0].resolution, Resolution::NormalizationEmpty);
        assert!(feed.articles[0].timestamp.is_none());
    }

    #[tokio::test]
    async fn test_cache_is_consulted_before_fetching() {
        let c = ArticleCandidate::new("https://example.com/cached", "GOOG");
        let fetcher = FakeFetcher::default();
        let calls = Arc::clone(&fetcher.calls);

        let mut cache = HashMap::new();
        cache.insert(
            c.url.clone(),
            FetchResult {
                candidate: c.clone(),
                outcome: Ok(META_PAGE.to_string()),
            },
        );

        let feed = pipeline(fetcher)
            .with_cache(cache)
            .process(vec![c], &CancellationToken::new())
            .await
            .unwrap();
        assert!(feed.articles[0].is_dated);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_returns_no_feed() {
        let c = ArticleCandidate::new("https://example.com/hangs", "META");
        let fetcher = FakeFetcher::default()
            .page(&c.url, META_PAGE)
            .delayed(&c.url, Duration::from_secs(30));
        let p = pipeline(fetcher);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result = p.process(vec![c], &cancel).await;
        assert_eq!(result, Err(Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_empty_input_gives_empty_feed() {
        let feed = pipeline(FakeFetcher::default())
            .process(Vec::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(feed.is_empty());
    }
}
