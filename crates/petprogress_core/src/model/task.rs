//! Task definitions: recurring series, per-day overrides and one-off items.
//!
//! # Responsibility
//! - Define the user-authored task records persisted inside `AppState`.
//! - Define the stable instance identity shared by both processes.
//!
//! # Invariants
//! - `ClockTime` is always a valid wall-clock time (`hour <= 23`, `minute <= 59`).
//! - A series occurrence id is derived from `(series_id, day_key)` only, so
//!   every process computes the same id without coordination.
//! - Rollover never mutates an existing `TaskItem`; it creates a new one.

use crate::model::day_key::DayKey;
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Identifier of a one-off task item.
pub type TaskId = Uuid;
/// Identifier of a recurring task series.
pub type SeriesId = Uuid;

/// Wall-clock time of day (hour + minute), timezone free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawClockTime", into = "RawClockTime")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawClockTime {
    hour: u8,
    minute: u8,
}

/// Invalid hour/minute pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTimeError {
    pub hour: u8,
    pub minute: u8,
}

impl Display for ClockTimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid clock time {:02}:{:02} (expected 00:00..=23:59)",
            self.hour, self.minute
        )
    }
}

impl Error for ClockTimeError {}

impl ClockTime {
    pub const MIDNIGHT: Self = Self { hour: 0, minute: 0 };

    pub fn new(hour: u8, minute: u8) -> Result<Self, ClockTimeError> {
        if hour > 23 || minute > 59 {
            return Err(ClockTimeError { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    /// Top of the given hour. Hours past 23 clamp to 23.
    pub fn top_of_hour(hour: u8) -> Self {
        Self {
            hour: hour.min(23),
            minute: 0,
        }
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    pub fn minute_of_day(self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl Display for ClockTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<RawClockTime> for ClockTime {
    type Error = ClockTimeError;

    fn try_from(value: RawClockTime) -> Result<Self, Self::Error> {
        Self::new(value.hour, value.minute)
    }
}

impl From<ClockTime> for RawClockTime {
    fn from(value: ClockTime) -> Self {
        Self {
            hour: value.hour,
            minute: value.minute,
        }
    }
}

/// Identity of one materialized task instance on one day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn for_item(id: TaskId) -> Self {
        Self(id.to_string())
    }

    /// `<series_id>@<day_key>`.
    pub fn for_series(series_id: SeriesId, day_key: DayKey) -> Self {
        Self(format!("{series_id}@{day_key}"))
    }

    /// Wraps an id received from a collaborator; no validation is applied,
    /// unknown ids simply never match a materialized instance.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for InstanceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Which days a series produces an occurrence on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrenceRule {
    Daily,
    Weekly {
        weekdays: Vec<Weekday>,
    },
    /// Exact day-of-month match; `31` does not fire in shorter months.
    Monthly {
        #[serde(rename = "daysOfMonth")]
        days_of_month: Vec<u32>,
    },
}

impl RecurrenceRule {
    pub fn covers(&self, day_key: DayKey) -> bool {
        match self {
            Self::Daily => true,
            Self::Weekly { weekdays } => weekdays.contains(&day_key.weekday()),
            Self::Monthly { days_of_month } => days_of_month.contains(&day_key.day_of_month()),
        }
    }
}

/// User-created recurring task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSeries {
    pub id: SeriesId,
    pub title: String,
    pub scheduled_time: ClockTime,
    pub recurrence_rule: RecurrenceRule,
    pub is_active: bool,
}

impl TaskSeries {
    pub fn new(title: impl Into<String>, scheduled_time: ClockTime, rule: RecurrenceRule) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            scheduled_time,
            recurrence_rule: rule,
            is_active: true,
        }
    }

    pub fn instance_id(&self, day_key: DayKey) -> InstanceId {
        InstanceId::for_series(self.id, day_key)
    }
}

/// Per-day change to one occurrence of a series.
///
/// Keyed by `(series_id, day_key)`; `is_deleted` wins over `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstanceOverride {
    pub id: Uuid,
    pub series_id: SeriesId,
    pub day_key: DayKey,
    #[serde(default)]
    pub time: Option<ClockTime>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl TaskInstanceOverride {
    pub fn reschedule(series_id: SeriesId, day_key: DayKey, time: ClockTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            series_id,
            day_key,
            time: Some(time),
            is_deleted: false,
        }
    }

    pub fn deletion(series_id: SeriesId, day_key: DayKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            series_id,
            day_key,
            time: None,
            is_deleted: true,
        }
    }

    pub fn matches(&self, series_id: SeriesId, day_key: DayKey) -> bool {
        self.series_id == series_id && self.day_key == day_key
    }
}

/// One-off task bound to a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub id: TaskId,
    pub title: String,
    pub scheduled_at: ClockTime,
    pub day_key: DayKey,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Instance this item was rolled over from, when created by closeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_over_from: Option<InstanceId>,
}

impl TaskItem {
    pub fn new(title: impl Into<String>, scheduled_at: ClockTime, day_key: DayKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            scheduled_at,
            day_key,
            is_completed: false,
            completed_at: None,
            rolled_over_from: None,
        }
    }

    /// Copy of an unfinished instance carried onto `day_key`.
    ///
    /// The id is derived from `(source, day_key)`, so every process that
    /// rolls the same instance over produces the same item.
    pub fn rolled_over(
        title: impl Into<String>,
        scheduled_at: ClockTime,
        source: InstanceId,
        day_key: DayKey,
    ) -> Self {
        let name = format!("rollover:{source}@{day_key}");
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()),
            rolled_over_from: Some(source),
            ..Self::new(title, scheduled_at, day_key)
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        InstanceId::for_item(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockTime, InstanceId, RecurrenceRule, TaskItem, TaskSeries};
    use crate::model::day_key::DayKey;
    use chrono::Weekday;

    #[test]
    fn rollover_ids_depend_only_on_source_and_day() {
        let day = DayKey::parse("2026-06-02").unwrap();
        let source = InstanceId::from_raw("series@2026-06-01");
        let first = TaskItem::rolled_over("Walk", ClockTime::top_of_hour(9), source.clone(), day);
        let second = TaskItem::rolled_over("Walk", ClockTime::top_of_hour(9), source.clone(), day);
        assert_eq!(first.id, second.id);
        assert_eq!(first.rolled_over_from, Some(source.clone()));

        let later = TaskItem::rolled_over("Walk", ClockTime::top_of_hour(9), source, day.next());
        assert_ne!(first.id, later.id);
    }

    #[test]
    fn clock_time_rejects_out_of_range_components() {
        assert!(ClockTime::new(24, 0).is_err());
        assert!(ClockTime::new(12, 60).is_err());
        assert_eq!(ClockTime::new(23, 59).unwrap().minute_of_day(), 1439);
        assert_eq!(ClockTime::top_of_hour(40).hour(), 23);
    }

    #[test]
    fn clock_time_deserialize_validates() {
        let ok: ClockTime = serde_json::from_str(r#"{"hour":7,"minute":5}"#).unwrap();
        assert_eq!(ok.to_string(), "07:05");
        assert!(serde_json::from_str::<ClockTime>(r#"{"hour":25,"minute":0}"#).is_err());
    }

    #[test]
    fn weekly_rule_matches_weekdays_only() {
        let rule = RecurrenceRule::Weekly {
            weekdays: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri],
        };
        assert!(rule.covers(DayKey::parse("2026-03-09").unwrap()));
        assert!(!rule.covers(DayKey::parse("2026-03-10").unwrap()));
    }

    #[test]
    fn monthly_rule_uses_exact_day_of_month() {
        let rule = RecurrenceRule::Monthly {
            days_of_month: vec![1, 31],
        };
        assert!(rule.covers(DayKey::parse("2026-04-01").unwrap()));
        assert!(!rule.covers(DayKey::parse("2026-04-30").unwrap()));
        assert!(rule.covers(DayKey::parse("2026-05-31").unwrap()));
    }

    #[test]
    fn series_instance_id_is_deterministic() {
        let series = TaskSeries::new("Gym", ClockTime::new(7, 0).unwrap(), RecurrenceRule::Daily);
        let day = DayKey::parse("2026-03-09").unwrap();
        assert_eq!(series.instance_id(day), series.instance_id(day));
        assert_eq!(
            series.instance_id(day),
            InstanceId::from_raw(format!("{}@2026-03-09", series.id))
        );
    }
}
