//! Hour-bucketed grace windows and calendar hour boundaries.
//!
//! # Invariants
//! - Window membership uses local wall-clock hour/minute only, never elapsed
//!   seconds, so a DST shift does not move a task's window.
//! - `next_top_of_hour` is strictly after its input and advances by calendar
//!   hours resolved through the timezone, not by a fixed 3600s offset.
//! - An instance is active only within grace of its own day's hour; today's
//!   23:00 is never active at 00:30, yesterday's is.

use crate::model::day_key::DayKey;
use crate::model::state::{AppState, MAX_GRACE_MINUTES};
use crate::model::task::ClockTime;
use crate::schedule::materialize::{materialize, ConcreteTask};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Timelike};

const MINUTES_PER_DAY: i32 = 24 * 60;
// A spring-forward gap is at most a couple of hours in practice.
const MAX_BOUNDARY_PROBES: i64 = 4;

/// Returns whether `current` lies within `grace_minutes` of `task_hour:00`.
///
/// Distance is circular over the day, so a 23:00 task with 120 minutes of
/// grace is still within its window at 01:00. Out-of-range inputs are clamped.
pub fn is_within_window<T: Timelike>(task_hour: u8, current: &T, grace_minutes: u16) -> bool {
    let task_minute = i32::from(task_hour.min(23)) * 60;
    let grace = i32::from(grace_minutes.min(MAX_GRACE_MINUTES));
    let now_minute = i32::try_from(current.hour() * 60 + current.minute()).unwrap_or(0);

    circular_distance(task_minute, now_minute) <= grace
}

fn circular_distance(a: i32, b: i32) -> i32 {
    let raw = b - a;
    [raw, raw + MINUTES_PER_DAY, raw - MINUTES_PER_DAY]
        .into_iter()
        .map(i32::abs)
        .min()
        .unwrap_or(raw.abs())
}

/// First top-of-hour instant strictly after `from`, in `from`'s timezone.
///
/// Wall-clock hours that do not exist (spring-forward gap) are skipped; a
/// repeated hour (fall-back) yields each of its instants in order.
pub fn next_top_of_hour<Tz: TimeZone>(from: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = from.timezone();
    let local = from.naive_local();
    let truncated = local
        .date()
        .and_hms_opt(local.hour(), 0, 0)
        .unwrap_or(local);

    for step in 0..MAX_BOUNDARY_PROBES {
        let candidate = truncated + Duration::hours(step);
        let resolved = match tz.from_local_datetime(&candidate) {
            LocalResult::Single(instant) => vec![instant],
            LocalResult::Ambiguous(earliest, latest) => vec![earliest, latest],
            LocalResult::None => Vec::new(),
        };
        if let Some(found) = resolved.into_iter().find(|instant| instant > from) {
            return found;
        }
    }

    from.clone() + Duration::hours(1)
}

/// Calendar date on which an instance of app day `day_key` actually happens.
///
/// Times before `reset` belong to the tail of the app day, after midnight.
pub fn occurrence_date(day_key: DayKey, time: ClockTime, reset: ClockTime) -> NaiveDate {
    if time < reset {
        day_key.next().date()
    } else {
        day_key.date()
    }
}

/// Signed wall-clock minutes from the instance's top of hour to `current`.
///
/// Negative while the instance is still ahead.
pub fn minutes_from_scheduled<Tz: TimeZone>(
    task: &ConcreteTask,
    reset: ClockTime,
    current: &DateTime<Tz>,
) -> i64 {
    let local = current.naive_local();
    let scheduled_on = DayKey::from_date(occurrence_date(task.day_key, task.time, reset));
    let days = scheduled_on.days_until(DayKey::from_date(local.date()));
    let now_minute = i64::from(local.hour() * 60 + local.minute());
    days * i64::from(MINUTES_PER_DAY) + now_minute - i64::from(task.time.hour()) * 60
}

/// Returns whether `task` is inside its grace window at `current`.
pub fn is_instance_active<Tz: TimeZone>(
    task: &ConcreteTask,
    reset: ClockTime,
    current: &DateTime<Tz>,
    grace_minutes: u16,
) -> bool {
    let grace = i64::from(grace_minutes.min(MAX_GRACE_MINUTES));
    minutes_from_scheduled(task, reset, current).abs() <= grace
}

/// Instances of the app days around `current` that a window could reach.
///
/// Previous, current and next app day, each in materialized order.
pub fn window_candidates<Tz: TimeZone>(
    state: &AppState,
    current: &DateTime<Tz>,
) -> Vec<ConcreteTask> {
    let today = DayKey::for_instant(current, state.reset_time);
    [today.previous(), today, today.next()]
        .into_iter()
        .flat_map(|day_key| materialize(day_key, state))
        .collect()
}

/// Instances whose grace window contains `current`, ascending by scheduled
/// instant.
pub fn active_tasks<Tz: TimeZone>(
    state: &AppState,
    current: &DateTime<Tz>,
) -> Vec<ConcreteTask> {
    let mut active: Vec<(i64, ConcreteTask)> = window_candidates(state, current)
        .into_iter()
        .filter(|task| is_instance_active(task, state.reset_time, current, state.grace_minutes))
        .map(|task| (minutes_from_scheduled(&task, state.reset_time, current), task))
        .collect();
    // Larger distance means scheduled earlier; stable sort keeps tie order.
    active.sort_by_key(|(distance, _)| -distance);
    active.into_iter().map(|(_, task)| task).collect()
}
