//! URL-path strategy: dates embedded in article permalinks.

use super::Page;
use crate::models::{RawDateHit, Strategy};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static PATH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/((?:19|20)\d{2})(?:/(\d{1,2})/(\d{1,2})|-(\d{2})-(\d{2}))(?:[/_.-]|$)")
        .expect("path date regex")
});

pub fn extract(page: &Page<'_>) -> Option<RawDateHit> {
    let day = date_in_url(page.url)?;
    Some(RawDateHit::text(
        day.format("%Y-%m-%d").to_string(),
        Strategy::UrlPath,
        page.extracted_at,
    ))
}

/// The first real calendar date found in the URL path.
pub fn date_in_url(url: &str) -> Option<NaiveDate> {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());

    PATH_DATE.captures_iter(&path).find_map(|caps| {
        let year = caps.get(1)?.as_str().parse().ok()?;
        let month = caps.get(2).or_else(|| caps.get(4))?.as_str().parse().ok()?;
        let day = caps.get(3).or_else(|| caps.get(5))?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawDateValue;
    use chrono::{TimeZone, Utc};
    use scraper::Html;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_slashed_path() {
        assert_eq!(
            date_in_url("https://www.example.com/2024/03/15/apple-earnings/"),
            Some(day(2024, 3, 15))
        );
        assert_eq!(
            date_in_url("https://example.com/news/2024/3/5/story.html"),
            Some(day(2024, 3, 5))
        );
    }

    #[test]
    fn test_dashed_segment() {
        assert_eq!(
            date_in_url("https://example.com/markets/2024-04-20/nvda-rally"),
            Some(day(2024, 4, 20))
        );
        assert_eq!(
            date_in_url("https://example.com/2024-04-20-nvda-rally"),
            Some(day(2024, 4, 20))
        );
    }

    #[test]
    fn test_query_string_is_ignored() {
        assert_eq!(date_in_url("https://example.com/story?d=/2024/03/15/"), None);
    }

    #[test]
    fn test_impossible_dates_rejected() {
        assert_eq!(date_in_url("https://example.com/2024/02/30/story"), None);
        assert_eq!(date_in_url("https://example.com/2024/13/01/story"), None);
        assert_eq!(date_in_url("https://example.com/2024/02/30/x/2024/02/28/y"), Some(day(2024, 2, 28)));
    }

    #[test]
    fn test_no_date_in_path() {
        assert_eq!(date_in_url("https://example.com/quote/AAPL"), None);
        assert_eq!(date_in_url("https://example.com/20240315/story"), None);
    }

    #[test]
    fn test_extract_builds_iso_day_hit() {
        let document = Html::parse_document("<html></html>");
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let hit = extract(&Page {
            document: &document,
            url: "https://example.com/2024/3/5/story",
            extracted_at: at,
        })
        .unwrap();
        assert_eq!(hit.value, RawDateValue::Text("2024-03-05".into()));
        assert_eq!(hit.strategy, Strategy::UrlPath);
        assert_eq!(hit.confidence_rank(), 2);
    }
}
