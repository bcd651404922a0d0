//! Canonical calendar-day keys.
//!
//! # Responsibility
//! - Parse, format and compare `YYYY-MM-DD` day keys in one place.
//! - Resolve the "app day" of an instant, honoring the configured reset time.
//!
//! # Invariants
//! - Wire form is exactly `YYYY-MM-DD` (zero padded, no surrounding text).
//! - Ordering is chronological, never lexical on a foreign string.
//! - Day arithmetic is calendar based (`NaiveDate`), independent of timezone.

use crate::model::task::ClockTime;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static DAY_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid day key regex"));

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// One local calendar day, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(NaiveDate);

/// Day key parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayKeyError {
    /// Input does not have the `YYYY-MM-DD` shape.
    Malformed(String),
    /// Shape is right but the date does not exist (e.g. `2026-02-30`).
    InvalidDate(String),
}

impl Display for DayKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(value) => write!(f, "day key must be YYYY-MM-DD, got `{value}`"),
            Self::InvalidDate(value) => write!(f, "day key is not a calendar date: `{value}`"),
        }
    }
}

impl Error for DayKeyError {}

impl DayKey {
    /// Parses a canonical day key.
    pub fn parse(raw: &str) -> Result<Self, DayKeyError> {
        let trimmed = raw.trim();
        if !DAY_KEY_RE.is_match(trimmed) {
            return Err(DayKeyError::Malformed(raw.to_string()));
        }
        NaiveDate::parse_from_str(trimmed, DAY_KEY_FORMAT)
            .map(Self)
            .map_err(|_| DayKeyError::InvalidDate(raw.to_string()))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Returns the app day in effect at `now`.
    ///
    /// Uses the local wall-clock components of `now`: before `reset` the
    /// previous calendar day is still current.
    pub fn for_instant<Tz: TimeZone>(now: &DateTime<Tz>, reset: ClockTime) -> Self {
        let local = now.naive_local();
        let key = Self(local.date());
        if local.time() < reset.to_naive_time() {
            key.previous()
        } else {
            key
        }
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    pub fn weekday(self) -> Weekday {
        self.0.weekday()
    }

    pub fn day_of_month(self) -> u32 {
        self.0.day()
    }

    /// Following calendar day. Saturates at the end of chrono's range.
    pub fn next(self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }

    /// Preceding calendar day. Saturates at the start of chrono's range.
    pub fn previous(self) -> Self {
        Self(self.0.pred_opt().unwrap_or(self.0))
    }

    /// Signed number of days from `self` to `other`.
    pub fn days_until(self, other: Self) -> i64 {
        other.0.signed_duration_since(self.0).num_days()
    }
}

impl Display for DayKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = DayKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DayKey {
    type Error = DayKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<DayKey> for String {
    fn from(value: DayKey) -> Self {
        value.to_string()
    }
}
