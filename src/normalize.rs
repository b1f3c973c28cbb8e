//! Turning raw date hits into canonical, timezone-aware timestamps.
//!
//! # Rules
//!
//! - Values with an explicit offset keep their instant.
//! - Values without one are read as wall-clock time in the source market's
//!   timezone, not UTC.
//! - Date-only values mean local midnight in the source timezone.
//! - Relative phrases count back from the hit's `extracted_at`: sub-day
//!   units subtract an exact duration, day-or-coarser units move whole
//!   calendar days (or months) and land on local midnight.
//! - Anything before 1990-01-01 UTC or later than `extracted_at` plus the
//!   allowed clock skew is rejected.
//!
//! Every accepted timestamp is returned in the display timezone.

use crate::config::PipelineConfig;
use crate::grammar::{self, AgoUnit, ParsedDate};
use crate::models::{RawDateHit, RawDateValue};
use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::error::Error;
use tracing::debug;

/// Earliest year accepted as a publication date.
pub const MIN_YEAR: i32 = 1990;

/// Turns raw date hits into timestamps in the display timezone.
///
/// Values without an offset are read in `source_tz`, and anything later
/// than the extraction instant plus `future_skew` is rejected.
#[derive(Debug, Clone)]
pub struct Normalizer {
    source_tz: Tz,
    display_tz: Tz,
    future_skew: TimeDelta,
}

impl Normalizer {
    /// Create a normalizer.
    ///
    /// # Arguments
    ///
    /// * `source_tz` - Zone assumed for dates that carry no offset
    /// * `display_tz` - Zone every accepted timestamp is converted to
    /// * `future_skew` - How far past the extraction instant a date may lie
    pub fn new(source_tz: Tz, display_tz: Tz, future_skew: TimeDelta) -> Self {
        Self {
            source_tz,
            display_tz,
            future_skew,
        }
    }

    /// Build a normalizer from configuration, validating timezone names.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, Box<dyn Error>> {
        let future_skew = TimeDelta::try_seconds(config.plausibility_future_skew_seconds)
            .ok_or("plausibility_future_skew_seconds is out of range")?;
        Ok(Self::new(config.source_tz()?, config.display_tz()?, future_skew))
    }

    pub fn source_tz(&self) -> Tz {
        self.source_tz
    }

    pub fn display_tz(&self) -> Tz {
        self.display_tz
    }

    /// Parse, localize, bound-check and convert a raw hit.
    ///
    /// Returns `None` when the value does not parse or falls outside the
    /// plausibility bound; callers treat both as "undated".
    pub fn normalize(&self, hit: &RawDateHit) -> Option<DateTime<Tz>> {
        let parsed = match &hit.value {
            RawDateValue::Text(s) => grammar::parse(s),
            RawDateValue::Epoch(n) => grammar::parse_epoch(*n),
        };
        let Some(parsed) = parsed else {
            debug!(value = %hit.value, strategy = %hit.strategy, "Date value did not parse");
            return None;
        };

        let instant = self.resolve(parsed, hit.extracted_at)?;
        if !self.is_plausible(instant, hit.extracted_at) {
            debug!(%instant, value = %hit.value, strategy = %hit.strategy, "Rejected implausible date");
            return None;
        }
        Some(instant.with_timezone(&self.display_tz))
    }

    /// Whether `instant` lies inside the accepted publication window.
    pub fn is_plausible(&self, instant: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let floor = Utc.with_ymd_and_hms(MIN_YEAR, 1, 1, 0, 0, 0).single();
        let Some(floor) = floor else {
            return false;
        };
        let Some(ceiling) = now.checked_add_signed(self.future_skew) else {
            return false;
        };
        instant >= floor && instant <= ceiling
    }

    fn resolve(&self, parsed: ParsedDate, extracted_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match parsed {
            ParsedDate::Instant(dt) => Some(dt.with_timezone(&Utc)),
            ParsedDate::Local(ndt) => self.localize(ndt),
            ParsedDate::Day(day) => self.local_midnight(day),
            ParsedDate::Ago { amount, unit } => self.resolve_ago(amount, unit, extracted_at),
        }
    }

    fn resolve_ago(&self, amount: u32, unit: AgoUnit, extracted_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let n = i64::from(amount);
        if !unit.is_calendar() {
            let delta = match unit {
                AgoUnit::Second => TimeDelta::try_seconds(n)?,
                AgoUnit::Minute => TimeDelta::try_minutes(n)?,
                _ => TimeDelta::try_hours(n)?,
            };
            return extracted_at.checked_sub_signed(delta);
        }

        let today = extracted_at.with_timezone(&self.source_tz).date_naive();
        let day = match unit {
            AgoUnit::Day => today.checked_sub_signed(TimeDelta::try_days(n)?)?,
            AgoUnit::Week => today.checked_sub_signed(TimeDelta::try_weeks(n)?)?,
            AgoUnit::Month => today.checked_sub_months(Months::new(amount))?,
            _ => today.checked_sub_months(Months::new(amount.checked_mul(12)?))?,
        };
        self.local_midnight(day)
    }

    fn local_midnight(&self, day: NaiveDate) -> Option<DateTime<Utc>> {
        self.localize(day.and_hms_opt(0, 0, 0)?)
    }

    /// Attach the source timezone to a wall-clock time.
    ///
    /// Ambiguous times take the earlier instant; times skipped by a DST jump
    /// move forward one hour.
    fn localize(&self, ndt: NaiveDateTime) -> Option<DateTime<Utc>> {
        let local = self
            .source_tz
            .from_local_datetime(&ndt)
            .earliest()
            .or_else(|| {
                let shifted = ndt.checked_add_signed(TimeDelta::try_hours(1)?)?;
                self.source_tz.from_local_datetime(&shifted).earliest()
            })?;
        Some(local.with_timezone(&Utc))
    }
}
