//! Article fetching with a bounded timeout and a single retry on timeout.
//!
//! # Architecture
//!
//! The module uses a trait-based design so the pipeline does not care where
//! HTML comes from:
//! - [`FetchPage`]: Core trait defining an async page fetch
//! - [`HttpFetcher`]: `reqwest`-backed implementation with charset handling
//! - [`RetryOnTimeout`]: Decorator that retries once, on timeouts only
//! - [`FetchCache`]: Optional lookup the pipeline consults before fetching
//!
//! # Error Taxonomy
//!
//! Every failure is reported as a [`FetchError`] value; nothing panics or
//! escapes past [`FetchPage::fetch_page`].

use crate::config::PipelineConfig;
use crate::models::{ArticleCandidate, FetchError, FetchResult};
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use rand::{Rng, rng};
use regex::bytes::Regex as BytesRegex;
use reqwest::header::CONTENT_TYPE;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// How many leading bytes are sniffed for a `<meta charset>` declaration.
const SNIFF_LIMIT: usize = 1024;

static META_CHARSET: Lazy<BytesRegex> = Lazy::new(|| {
    BytesRegex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#).expect("meta charset regex")
});

/// Trait for async page retrieval.
///
/// Implementors return the decoded HTML of `url` or a [`FetchError`]
/// describing why there is none.
pub trait FetchPage {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

/// Previously fetched pages the pipeline may reuse instead of fetching.
///
/// Owned by the caller; the pipeline only reads from it.
pub trait FetchCache {
    fn lookup(&self, url: &str) -> Option<FetchResult>;
}

impl FetchCache for HashMap<String, FetchResult> {
    fn lookup(&self, url: &str) -> Option<FetchResult> {
        self.get(url).cloned()
    }
}

/// Fetch one candidate, turning the outcome into a [`FetchResult`].
pub async fn fetch<F: FetchPage>(fetcher: &F, candidate: ArticleCandidate) -> FetchResult {
    let outcome = fetcher.fetch_page(&candidate.url).await;
    FetchResult { candidate, outcome }
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher around a fresh `reqwest` client.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Total time allowed for one request, body included
    /// * `user_agent` - Value sent in the `User-Agent` header
    ///
    /// # Returns
    ///
    /// The fetcher, or the client builder's error (e.g. TLS backend setup).
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Build a fetcher from the configured timeout and user agent.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, Box<dyn Error>> {
        Self::new(config.request_timeout()?, &config.user_agent)
    }
}

impl FetchPage for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Non-success status");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);
        let body = response.bytes().await.map_err(classify)?;
        let html = decode_body(&body, declared.as_deref())?;

        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(html)
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

/// The `charset` parameter of a `Content-Type` header value.
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
    })
}

/// Decode a response body strictly.
///
/// The encoding comes from, in order: a byte-order mark, the declared
/// charset, a `<meta charset>` in the first kilobyte, then UTF-8. Bytes that
/// are invalid in that encoding produce [`FetchError::Decode`].
pub fn decode_body(body: &[u8], declared: Option<&str>) -> Result<String, FetchError> {
    let (encoding, bom_len) = match Encoding::for_bom(body) {
        Some((encoding, len)) => (encoding, len),
        None => {
            let label = declared
                .map(str::to_string)
                .or_else(|| sniff_meta_charset(body));
            let encoding = match label {
                Some(label) => Encoding::for_label(label.as_bytes())
                    .ok_or_else(|| FetchError::Decode(format!("unknown charset {label:?}")))?,
                None => UTF_8,
            };
            (encoding, 0)
        }
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(&body[bom_len..])
        .map(|text| text.into_owned())
        .ok_or_else(|| FetchError::Decode(format!("body is not valid {}", encoding.name())))
}

fn sniff_meta_charset(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(SNIFF_LIMIT)];
    let caps = META_CHARSET.captures(head)?;
    String::from_utf8(caps.get(1)?.as_bytes().to_vec()).ok()
}

/// Wrapper that retries an inner [`FetchPage`] once when it times out.
///
/// HTTP status errors, network errors and decode errors are returned on
/// first occurrence. Before the retry the task sleeps `base_delay` plus up
/// to 250ms of random jitter.
pub struct RetryOnTimeout<T> {
    inner: T,
    base_delay: Duration,
}

impl<T> RetryOnTimeout<T>
where
    T: FetchPage,
{
    /// Wrap `inner`.
    ///
    /// # Arguments
    ///
    /// * `inner` - The fetcher whose timeouts are retried
    /// * `base_delay` - Fixed pause before the retry; jitter is added on top
    pub fn new(inner: T, base_delay: Duration) -> Self {
        Self { inner, base_delay }
    }
}

impl<T> fmt::Debug for RetryOnTimeout<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOnTimeout")
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<T> FetchPage for RetryOnTimeout<T>
where
    T: FetchPage,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        match self.inner.fetch_page(url).await {
            Err(FetchError::Timeout) => {
                let jitter_ms: u64 = rng().random_range(0..=250);
                let delay = self.base_delay + Duration::from_millis(jitter_ms);
                warn!(?delay, "Fetch timed out; retrying once");
                sleep(delay).await;
                self.inner.fetch_page(url).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout_ms: u64) -> HttpFetcher {
        HttpFetcher::new(Duration::from_millis(timeout_ms), "ticker-news-test").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_utf8() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "<html><body>Résumé</body></html>".to_string(),
                    "text/html; charset=utf-8",
                ),
            )
            .expect(1)
            .mount(&server)
            .await;

        let html = fetcher(2_000)
            .fetch_page(&format!("{}/ok", server.uri()))
            .await
            .unwrap();
        assert!(html.contains("Résumé"));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher(2_000)
            .fetch_page(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::HttpStatus(404));
    }

    #[tokio::test]
    async fn test_timeout_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
            .mount(&server)
            .await;

        let err = fetcher(100)
            .fetch_page(&format!("{}/slow", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Timeout);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let err = fetcher(2_000)
            .fetch_page("http://127.0.0.1:9/nothing-listens-here")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_retry_happens_once_on_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
            .expect(2)
            .mount(&server)
            .await;

        let retrying = RetryOnTimeout::new(fetcher(100), Duration::from_millis(10));
        let err = retrying
            .fetch_page(&format!("{}/slow", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Timeout);
    }

    #[tokio::test]
    async fn test_no_retry_on_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocked"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let retrying = RetryOnTimeout::new(fetcher(2_000), Duration::from_millis(10));
        let err = retrying
            .fetch_page(&format!("{}/blocked", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::HttpStatus(403));
    }

    struct FlakyOnce {
        calls: AtomicUsize,
    }

    impl FetchPage for FlakyOnce {
        async fn fetch_page(&self, _url: &str) -> Result<String, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FetchError::Timeout)
            } else {
                Ok("<html></html>".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_timeout() {
        let retrying = RetryOnTimeout::new(
            FlakyOnce {
                calls: AtomicUsize::new(0),
            },
            Duration::from_millis(1),
        );
        assert_eq!(retrying.fetch_page("https://example.com").await.unwrap(), "<html></html>");
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_declared_legacy_charset() {
        let server = MockServer::start().await;
        // "café" in windows-1252
        let body = b"<html><body>caf\xe9</body></html>".to_vec();
        Mock::given(method("GET"))
            .and(path("/latin"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=windows-1252"),
            )
            .mount(&server)
            .await;

        let html = fetcher(2_000)
            .fetch_page(&format!("{}/latin", server.uri()))
            .await
            .unwrap();
        assert!(html.contains("café"));
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let err = decode_body(b"<html>\xff\xfe\xfd</html>", Some("utf-8")).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn test_unknown_charset_is_decode_error() {
        let err = decode_body(b"<html></html>", Some("klingon-8")).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn test_meta_charset_sniffing() {
        let body = b"<html><head><meta charset=\"iso-8859-1\"></head><body>na\xefve</body></html>";
        assert_eq!(decode_body(body, None).unwrap(), "<html><head><meta charset=\"iso-8859-1\"></head><body>naïve</body></html>");
    }

    #[test]
    fn test_bom_wins() {
        let body = b"\xef\xbb\xbf<p>ok</p>";
        assert_eq!(decode_body(body, Some("windows-1252")).unwrap(), "<p>ok</p>");
    }

    #[test]
    fn test_charset_from_content_type() {
        assert_eq!(
            charset_from_content_type("text/html; charset=\"ISO-8859-1\""),
            Some("ISO-8859-1".to_string())
        );
        assert_eq!(charset_from_content_type("text/html"), None);
    }

    #[test]
    fn test_cache_lookup() {
        let candidate = ArticleCandidate::new("https://example.com/a", "AAPL");
        let mut cache = HashMap::new();
        cache.insert(
            candidate.url.clone(),
            FetchResult {
                candidate: candidate.clone(),
                outcome: Ok("<html></html>".to_string()),
            },
        );
        assert!(cache.lookup("https://example.com/a").is_some());
        assert!(cache.lookup("https://example.com/b").is_none());
    }
}
