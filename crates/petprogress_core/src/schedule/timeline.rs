//! Hour-aligned snapshots for the display process.
//!
//! # Responsibility
//! - Precompute what the display should show at each upcoming top of hour.
//!
//! # Invariants
//! - The first entry is strictly after `now`; the already-elapsed hour is
//!   never re-emitted.
//! - Every call starts from a fresh `load()`; nothing is cached between calls.
//! - Projected closeouts run on a private copy that is never saved.

use crate::model::day_key::DayKey;
use crate::model::pet::PetState;
use crate::model::state::AppState;
use crate::pet::closeout::run_due_closeouts;
use crate::pet::evolution::PetEvolutionEngine;
use crate::schedule::materialize::{materialize, ConcreteTask};
use crate::schedule::window::{active_tasks, next_top_of_hour};
use crate::store::{StateStore, StoreResult};
use chrono::{DateTime, FixedOffset, TimeZone};
use log::info;
use serde::Serialize;
use std::time::Instant;

pub const DEFAULT_TIMELINE_ENTRIES: usize = 24;

/// What the display shows from `timestamp` until the next entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub day_key: DayKey,
    pub tasks: Vec<ConcreteTask>,
    pub active: Vec<ConcreteTask>,
    pub pet: PetState,
    pub stage_name: String,
    pub stage_asset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub generated_at: DateTime<FixedOffset>,
    pub entries: Vec<TimelineEntry>,
    /// When the host should ask for a new timeline.
    pub refresh_after: DateTime<FixedOffset>,
}

/// Builds `count` snapshots after `now` from an already-loaded state.
pub fn build_timeline<Tz: TimeZone>(
    state: &AppState,
    engine: &PetEvolutionEngine,
    now: &DateTime<Tz>,
    count: usize,
) -> Timeline {
    let mut projected = state.clone();
    let mut entries = Vec::with_capacity(count);
    let mut boundary = now.clone();

    for _ in 0..count {
        boundary = next_top_of_hour(&boundary);
        run_due_closeouts(engine, &mut projected, &boundary);

        let day_key = DayKey::for_instant(&boundary, projected.reset_time);
        let tasks = materialize(day_key, &projected);
        let active = active_tasks(&projected, &boundary);
        entries.push(TimelineEntry {
            timestamp: boundary.fixed_offset(),
            day_key,
            tasks,
            active,
            stage_name: engine.stage_name(&projected.pet).to_string(),
            stage_asset: engine.stage_asset(&projected.pet).to_string(),
            pet: projected.pet.clone(),
        });
    }

    let refresh_after = entries
        .last()
        .map(|entry| entry.timestamp)
        .unwrap_or_else(|| next_top_of_hour(now).fixed_offset());

    Timeline {
        generated_at: now.fixed_offset(),
        entries,
        refresh_after,
    }
}

/// Stateless scheduler invoked by the host's refresh mechanism.
pub struct TimelineScheduler<S: StateStore> {
    store: S,
    engine: PetEvolutionEngine,
    entry_count: usize,
}

impl<S: StateStore> TimelineScheduler<S> {
    pub fn new(store: S, engine: PetEvolutionEngine) -> Self {
        Self {
            store,
            engine,
            entry_count: DEFAULT_TIMELINE_ENTRIES,
        }
    }

    pub fn with_entry_count(mut self, entry_count: usize) -> Self {
        self.entry_count = entry_count;
        self
    }

    /// Loads the shared record and projects the upcoming entries.
    pub fn build<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> StoreResult<Timeline> {
        let started_at = Instant::now();
        let state = self.store.load()?;
        let timeline = build_timeline(&state, &self.engine, now, self.entry_count);
        info!(
            "event=timeline_build module=timeline status=ok entries={} duration_ms={}",
            timeline.entries.len(),
            started_at.elapsed().as_millis()
        );
        Ok(timeline)
    }
}
