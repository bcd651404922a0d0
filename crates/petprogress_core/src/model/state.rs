//! The single persisted aggregate shared by host and display processes.
//!
//! # Responsibility
//! - Hold every user-authored record plus pet progression and settings.
//! - Provide small, pure mutation helpers used by services.
//!
//! # Invariants
//! - `grace_minutes` is always within `0..=MAX_GRACE_MINUTES`.
//! - At most one override exists per `(series_id, day_key)`.
//! - The aggregate is loaded and saved as one unit; nothing here does I/O.
//!
//! # See also
//! - `store::schema` for wire versions and upgrades.

use crate::model::day_key::DayKey;
use crate::model::pet::PetState;
use crate::model::task::{
    ClockTime, InstanceId, SeriesId, TaskInstanceOverride, TaskItem, TaskSeries,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Wire schema version written by this binary.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;
pub const MAX_GRACE_MINUTES: u16 = 180;
pub const DEFAULT_GRACE_MINUTES: u16 = 30;

/// Completed instance ids per day.
pub type Completions = BTreeMap<DayKey, BTreeSet<InstanceId>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub schema_version: u32,
    #[serde(default)]
    pub tasks: Vec<TaskItem>,
    #[serde(default)]
    pub series: Vec<TaskSeries>,
    #[serde(default)]
    pub overrides: Vec<TaskInstanceOverride>,
    #[serde(default)]
    pub pet: PetState,
    #[serde(default)]
    pub completions: Completions,
    #[serde(
        default = "default_grace_minutes",
        deserialize_with = "deserialize_grace_minutes"
    )]
    pub grace_minutes: u16,
    #[serde(default)]
    pub rollover_enabled: bool,
    #[serde(default = "default_reset_time")]
    pub reset_time: ClockTime,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            tasks: Vec::new(),
            series: Vec::new(),
            overrides: Vec::new(),
            pet: PetState::new(),
            completions: Completions::new(),
            grace_minutes: DEFAULT_GRACE_MINUTES,
            rollover_enabled: false,
            reset_time: ClockTime::MIDNIGHT,
        }
    }
}

impl AppState {
    /// Sets grace minutes, clamping to `0..=180`.
    pub fn set_grace_minutes(&mut self, minutes: i64) {
        self.grace_minutes = clamp_grace_minutes(minutes);
    }

    pub fn is_completed(&self, day_key: DayKey, instance_id: &InstanceId) -> bool {
        self.completions
            .get(&day_key)
            .is_some_and(|ids| ids.contains(instance_id))
    }

    /// Records a completion. Returns `false` when it was already recorded.
    pub fn mark_completed(&mut self, day_key: DayKey, instance_id: InstanceId) -> bool {
        self.completions
            .entry(day_key)
            .or_default()
            .insert(instance_id)
    }

    pub fn override_for(
        &self,
        series_id: SeriesId,
        day_key: DayKey,
    ) -> Option<&TaskInstanceOverride> {
        self.overrides
            .iter()
            .find(|candidate| candidate.matches(series_id, day_key))
    }

    /// Inserts an override, replacing any existing one for the same key.
    pub fn upsert_override(&mut self, value: TaskInstanceOverride) {
        match self
            .overrides
            .iter_mut()
            .find(|candidate| candidate.matches(value.series_id, value.day_key))
        {
            Some(existing) => {
                existing.time = value.time;
                existing.is_deleted = value.is_deleted;
            }
            None => self.overrides.push(value),
        }
    }

    pub fn series_by_id(&self, series_id: SeriesId) -> Option<&TaskSeries> {
        self.series.iter().find(|series| series.id == series_id)
    }
}

pub fn clamp_grace_minutes(minutes: i64) -> u16 {
    let clamped = minutes.clamp(0, i64::from(MAX_GRACE_MINUTES));
    u16::try_from(clamped).unwrap_or(MAX_GRACE_MINUTES)
}

fn default_grace_minutes() -> u16 {
    DEFAULT_GRACE_MINUTES
}

fn default_reset_time() -> ClockTime {
    ClockTime::MIDNIGHT
}

fn deserialize_grace_minutes<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(clamp_grace_minutes(raw))
}
