//! Date grammars recognized in article markup.
//!
//! Parsing here is purely syntactic: the result says what kind of date a
//! string denotes without deciding a timezone or an anchor instant. The
//! extractor uses [`parse`] to decide whether a candidate string is a date
//! at all, and the normalizer uses it again to turn the winning hit into a
//! timestamp.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// What a date string denotes, before timezone and anchoring decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDate {
    /// Carries its own UTC offset.
    Instant(DateTime<FixedOffset>),
    /// Wall-clock time with no offset.
    Local(NaiveDateTime),
    /// Calendar day only.
    Day(NaiveDate),
    /// "N units ago", counted back from the extraction instant.
    Ago { amount: u32, unit: AgoUnit },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgoUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl AgoUnit {
    /// Day-or-coarser units only carry calendar-day precision.
    pub fn is_calendar(self) -> bool {
        matches!(
            self,
            AgoUnit::Day | AgoUnit::Week | AgoUnit::Month | AgoUnit::Year
        )
    }

    fn from_word(word: &str) -> Option<Self> {
        let unit = match word.trim_end_matches('s') {
            "sec" | "second" => AgoUnit::Second,
            "min" | "minute" => AgoUnit::Minute,
            "hr" | "hour" => AgoUnit::Hour,
            "day" => AgoUnit::Day,
            "week" => AgoUnit::Week,
            "month" => AgoUnit::Month,
            "year" => AgoUnit::Year,
            _ => return None,
        };
        Some(unit)
    }
}

const MONTH_NAMES: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

/// Finds date-shaped substrings inside free text.
pub static DATE_SUBSTRING: Lazy<Regex> = Lazy::new(|| {
    let iso = r"\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?";
    let month_first = format!(
        r"\b{MONTH_NAMES}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}(?:,?\s+(?:at\s+)?\d{{1,2}}:\d{{2}}\s*(?:[ap]\.?m\.?)?(?:\s+(?:utc|gmt|e[sd]?t|c[sd]?t|p[sd]?t|bst|cest|cet|eest|eet|ist|jst|aest)\b)?)?"
    );
    let day_first = format!(r"\b\d{{1,2}}(?:st|nd|rd|th)?\s+{MONTH_NAMES}\.?,?\s+\d{{4}}");
    let slashed = r"\b\d{4}/\d{1,2}/\d{1,2}(?:\s+\d{1,2}:\d{2}(?::\d{2})?)?\b|\b\d{1,2}/\d{1,2}/\d{4}\b";
    let relative = r"\b(?:\d+|an?|one)\s+(?:sec(?:ond)?|min(?:ute)?|h(?:ou)?r|day|week|month|year)s?\s+ago|\byesterday\b|\btoday\b";
    Regex::new(&format!(
        r"(?i){iso}|{slashed}|{month_first}|{day_first}|{relative}"
    ))
    .expect("date substring regex")
});

static RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+|an?|one)\s+(sec(?:ond)?s?|min(?:ute)?s?|h(?:ou)?rs?|days?|weeks?|months?|years?)\s+ago$")
        .expect("relative regex")
});
static WEEKDAY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:mon|tue|tues|wed|thu|thur|thurs|fri|sat|sun)[a-z]*\.?,?\s+")
        .expect("weekday regex")
});
static ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d)(?:st|nd|rd|th)\b").expect("ordinal regex"));
static TRAILING_ZONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+([a-z]{1,5})$").expect("zone regex"));
static YEAR_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4}),\s+").expect("year comma regex"));
static SEPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsept\b").expect("sept regex"));
static MERIDIEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([ap])\.?m\.?$").expect("meridiem regex"));

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z", "%Y-%m-%d %H:%M:%S%z"];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%B %d, %Y %I:%M %p",
    "%B %d %Y %I:%M %p",
    "%B %d, %Y at %I:%M %p",
    "%B %d, %Y %H:%M",
    "%d %B %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%m/%d/%Y",
];

/// Parse a date string in any supported grammar.
///
/// Returns `None` when the string is not recognizably a date.
pub fn parse(raw: &str) -> Option<ParsedDate> {
    let s = raw.trim();
    if s.is_empty() || s.len() > 80 {
        return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) && s.len() != 8 {
        return s.parse::<i64>().ok().and_then(parse_epoch);
    }

    if let Some(ago) = parse_relative(s) {
        return Some(ago);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(ParsedDate::Instant(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(ParsedDate::Instant(dt));
    }
    // chrono's %z does not take "Z", so retry with an explicit zero offset.
    let zulu = s
        .strip_suffix('Z')
        .or_else(|| s.strip_suffix('z'))
        .map(|head| format!("{head}+00:00"));
    for candidate in std::iter::once(s).chain(zulu.as_deref()) {
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(ParsedDate::Instant(dt));
            }
        }
    }

    let (cleaned, is_utc) = clean_human(s);
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some(if is_utc {
                ParsedDate::Instant(ndt.and_utc().fixed_offset())
            } else {
                ParsedDate::Local(ndt)
            });
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(day) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Some(ParsedDate::Day(day));
        }
    }
    None
}

/// Interpret a number as Unix seconds (10 digits) or milliseconds (13 digits).
pub fn parse_epoch(n: i64) -> Option<ParsedDate> {
    let dt = match n.unsigned_abs().to_string().len() {
        9 | 10 => DateTime::<Utc>::from_timestamp(n, 0)?,
        12 | 13 => DateTime::<Utc>::from_timestamp_millis(n)?,
        _ => return None,
    };
    Some(ParsedDate::Instant(dt.fixed_offset()))
}

fn parse_relative(s: &str) -> Option<ParsedDate> {
    let lower = s.to_ascii_lowercase();
    match lower.as_str() {
        "today" => {
            return Some(ParsedDate::Ago {
                amount: 0,
                unit: AgoUnit::Day,
            });
        }
        "just now" => {
            return Some(ParsedDate::Ago {
                amount: 0,
                unit: AgoUnit::Minute,
            });
        }
        "yesterday" => {
            return Some(ParsedDate::Ago {
                amount: 1,
                unit: AgoUnit::Day,
            });
        }
        _ => {}
    }

    let caps = RELATIVE.captures(&lower)?;
    let amount = match &caps[1] {
        "a" | "an" | "one" => 1,
        n => n.parse().ok()?,
    };
    let unit = AgoUnit::from_word(&caps[2])?;
    Some(ParsedDate::Ago { amount, unit })
}

/// Normalize human-written dates so chrono's formats can match them.
///
/// Returns the cleaned string and whether a trailing zone marked it as UTC.
fn clean_human(s: &str) -> (String, bool) {
    let mut out = WEEKDAY_PREFIX.replace(s, "").into_owned();
    out = ORDINAL.replace_all(&out, "$1").into_owned();
    out = SEPT.replace(&out, "Sep").into_owned();

    let mut is_utc = false;
    if let Some(caps) = TRAILING_ZONE.captures(&out) {
        let zone = caps[1].to_ascii_uppercase();
        let is_zone = zone == "Z" || (zone.len() >= 2 && !matches!(zone.as_str(), "AM" | "PM"));
        if is_zone {
            is_utc = matches!(zone.as_str(), "UTC" | "GMT" | "Z");
            let cut = caps.get(0).map(|m| m.start()).unwrap_or(out.len());
            out.truncate(cut);
        }
    }

    out = MERIDIEM.replace(&out, "${1}M").into_owned();
    // "May 5, 2024, 10:30 AM" -> "May 5, 2024 10:30 AM"
    out = YEAR_COMMA.replace(&out, "$1 ").into_owned();
    // "Jan. 5" -> "Jan 5"; keeps decimal seconds intact.
    let out = out
        .split_whitespace()
        .map(|w| {
            if w.ends_with('.') && w.chars().next().is_some_and(|c| c.is_alphabetic()) {
                w.trim_end_matches('.')
            } else {
                w
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    (out, is_utc)
}
