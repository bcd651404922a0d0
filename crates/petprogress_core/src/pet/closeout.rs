//! Day-boundary settlement.
//!
//! # Responsibility
//! - Count a day's completed/missed instances and feed the evolution engine.
//! - Roll incomplete instances over to the next day when enabled.
//! - Catch up on days missed while neither process ran.
//!
//! # Invariants
//! - A day is settled at most once (guarded by `PetState::last_closeout_day_key`).
//! - Rollover creates new one-off items; the closed day's records are untouched.
//! - Rollover ids are derived from the source instance, so a projected
//!   closeout and the real one agree on them.
//! - Catch-up never settles more than `MAX_CATCH_UP_DAYS` days in one call.

use crate::model::day_key::DayKey;
use crate::model::state::AppState;
use crate::model::task::TaskItem;
use crate::pet::evolution::{PetEvolutionEngine, PetTransition};
use crate::schedule::materialize::materialize;
use chrono::{DateTime, Days, TimeZone};
use log::{debug, info};

pub const MAX_CATCH_UP_DAYS: u64 = 7;

/// Result of settling one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseoutReport {
    pub day_key: DayKey,
    pub completed: usize,
    pub missed: usize,
    pub total: usize,
    pub rolled_over: usize,
    pub transition: PetTransition,
}

impl CloseoutReport {
    pub fn applied(&self) -> bool {
        self.transition.applied
    }
}

/// Settles `day_key`. A repeated call for the same day changes nothing.
pub fn close_day(
    engine: &PetEvolutionEngine,
    state: &mut AppState,
    day_key: DayKey,
) -> CloseoutReport {
    let tasks = materialize(day_key, state);
    let total = tasks.len();
    let completed = tasks.iter().filter(|task| task.is_completed).count();
    let missed = total - completed;

    let transition = engine.on_daily_closeout(
        &mut state.pet,
        count_as_xp(completed),
        count_as_xp(missed),
        count_as_xp(total),
        day_key,
    );

    if !transition.applied {
        debug!("event=closeout module=closeout status=skip reason=already_closed day={day_key}");
        return CloseoutReport {
            day_key,
            completed,
            missed,
            total,
            rolled_over: 0,
            transition,
        };
    }

    let mut rolled_over = 0;
    if state.rollover_enabled {
        let next_day = day_key.next();
        for task in tasks.iter().filter(|task| !task.is_completed) {
            let copy = TaskItem::rolled_over(
                task.title.clone(),
                task.time,
                task.instance_id.clone(),
                next_day,
            );
            if state.tasks.iter().any(|item| item.id == copy.id) {
                continue;
            }
            state.tasks.push(copy);
            rolled_over += 1;
        }
    }

    info!(
        "event=closeout module=closeout status=ok day={} completed={} missed={} total={} stage_before={} stage_after={} xp_after={} rolled_over={}",
        day_key,
        completed,
        missed,
        total,
        transition.before.stage_index,
        transition.after.stage_index,
        transition.after.stage_xp,
        rolled_over
    );

    CloseoutReport {
        day_key,
        completed,
        missed,
        total,
        rolled_over,
        transition,
    }
}

/// Days that must be settled before `today`, oldest first.
///
/// Without a previous closeout only yesterday is due.
pub fn due_days(last_closed: Option<DayKey>, today: DayKey) -> Vec<DayKey> {
    let yesterday = today.previous();
    let earliest_allowed = DayKey::from_date(
        today
            .date()
            .checked_sub_days(Days::new(MAX_CATCH_UP_DAYS))
            .unwrap_or(today.date()),
    );
    let start = match last_closed {
        Some(last) => last.next().max(earliest_allowed),
        None => yesterday,
    };

    let mut days = Vec::new();
    let mut cursor = start;
    while cursor <= yesterday {
        days.push(cursor);
        cursor = cursor.next();
        if days.len() as u64 >= MAX_CATCH_UP_DAYS {
            break;
        }
    }
    days
}

/// Settles every day that ended before the app day containing `now`.
pub fn run_due_closeouts<Tz: TimeZone>(
    engine: &PetEvolutionEngine,
    state: &mut AppState,
    now: &DateTime<Tz>,
) -> Vec<CloseoutReport> {
    let today = DayKey::for_instant(now, state.reset_time);
    due_days(state.pet.last_closeout_day_key, today)
        .into_iter()
        .map(|day_key| close_day(engine, state, day_key))
        .collect()
}

fn count_as_xp(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
