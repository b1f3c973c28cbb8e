//! JSON output for downstream consumers.
//!
//! Each run writes one file, `{json_output_dir}/{date}/news_{HHMMSS}.json`,
//! named after the local time the run finished.

use crate::models::{RankedFeed, ResolvedArticle};
use chrono::{DateTime, Local};
use chrono_tz::Tz;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// The serialized shape of one run.
#[derive(Debug, Serialize)]
pub struct FeedDocument<'a> {
    pub generated_at: DateTime<Local>,
    pub display_timezone: &'a str,
    pub articles: &'a [ResolvedArticle],
}

impl<'a> FeedDocument<'a> {
    pub fn new(feed: &'a RankedFeed, display_tz: Tz, generated_at: DateTime<Local>) -> Self {
        Self {
            generated_at,
            display_timezone: display_tz.name(),
            articles: &feed.articles,
        }
    }
}

/// Write `feed` under `json_output_dir`, returning the file path.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir, articles = feed.len()))]
pub async fn write_feed(
    feed: &RankedFeed,
    display_tz: Tz,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let now = Local::now();
    let json = serde_json::to_string_pretty(&FeedDocument::new(feed, display_tz, now))?;

    let dir = PathBuf::from(json_output_dir).join(now.format("%Y-%m-%d").to_string());
    if let Err(e) = fs::create_dir_all(&dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = dir.join(format!("news_{}.json", now.format("%H%M%S")));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON feed");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleCandidate, Resolution, Strategy};
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn feed() -> RankedFeed {
        RankedFeed {
            articles: vec![
                ResolvedArticle::dated(
                    ArticleCandidate::new("https://example.com/a", "AAPL"),
                    New_York.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap(),
                    Strategy::StructuredMetadata,
                ),
                ResolvedArticle::undated(
                    ArticleCandidate::new("https://example.com/b", "AAPL"),
                    Resolution::ExtractionEmpty,
                ),
            ],
        }
    }

    #[tokio::test]
    async fn test_write_feed_layout_and_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_feed(&feed(), New_York, dir.path().to_str().unwrap())
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("news_") && name.ends_with(".json"), "{name}");
        assert_eq!(path.parent().unwrap().parent().unwrap(), dir.path());

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["display_timezone"], "America/New_York");
        let articles = value["articles"].as_array().unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0]["source_query"], "AAPL");
        assert_eq!(articles[0]["is_dated"], true);
        assert!(articles[0]["timestamp"].as_str().unwrap().starts_with("2024-05-01T06:00:00"));
        assert!(articles[1]["timestamp"].is_null());
        assert_eq!(articles[1]["resolution"], "extraction_empty");
    }
}
