//! Expansion of series, overrides and one-offs into per-day instances.
//!
//! # Responsibility
//! - Produce the concrete task list both processes render for one day.
//!
//! # Invariants
//! - Pure: identical `(day_key, state)` always yields an identical list.
//! - A delete-override removes its occurrence entirely.
//! - Output is sorted by effective time; ties keep input order (one-offs in
//!   stored order, then series in stored order).

use crate::model::day_key::DayKey;
use crate::model::state::AppState;
use crate::model::task::{ClockTime, InstanceId, SeriesId, TaskId};
use serde::Serialize;

/// Where a concrete instance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TaskOrigin {
    OneOff(TaskId),
    Series(SeriesId),
}

/// One task instance existing on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcreteTask {
    pub instance_id: InstanceId,
    pub origin: TaskOrigin,
    pub title: String,
    /// Effective time after overrides.
    pub time: ClockTime,
    pub day_key: DayKey,
    pub is_completed: bool,
}

/// Materializes every task instance for `day_key`.
pub fn materialize(day_key: DayKey, state: &AppState) -> Vec<ConcreteTask> {
    let one_offs = state
        .tasks
        .iter()
        .filter(|item| item.day_key == day_key)
        .map(|item| {
            let instance_id = item.instance_id();
            ConcreteTask {
                is_completed: item.is_completed || state.is_completed(day_key, &instance_id),
                instance_id,
                origin: TaskOrigin::OneOff(item.id),
                title: item.title.clone(),
                time: item.scheduled_at,
                day_key,
            }
        });

    let occurrences = state
        .series
        .iter()
        .filter(|series| series.is_active && series.recurrence_rule.covers(day_key))
        .filter_map(|series| {
            let override_entry = state.override_for(series.id, day_key);
            if override_entry.is_some_and(|entry| entry.is_deleted) {
                return None;
            }
            let time = override_entry
                .and_then(|entry| entry.time)
                .unwrap_or(series.scheduled_time);
            let instance_id = series.instance_id(day_key);
            Some(ConcreteTask {
                is_completed: state.is_completed(day_key, &instance_id),
                instance_id,
                origin: TaskOrigin::Series(series.id),
                title: series.title.clone(),
                time,
                day_key,
            })
        });

    let mut tasks: Vec<ConcreteTask> = one_offs.chain(occurrences).collect();
    // Stable sort keeps input order for equal times.
    tasks.sort_by_key(|task| task.time);
    tasks
}

/// Looks up one instance in the day's materialized set.
pub fn find_instance(
    day_key: DayKey,
    state: &AppState,
    instance_id: &InstanceId,
) -> Option<ConcreteTask> {
    materialize(day_key, state)
        .into_iter()
        .find(|task| &task.instance_id == instance_id)
}

#[cfg(test)]
mod tests {
    use super::{find_instance, materialize, TaskOrigin};
    use crate::model::day_key::DayKey;
    use crate::model::state::AppState;
    use crate::model::task::{
        ClockTime, InstanceId, RecurrenceRule, TaskInstanceOverride, TaskItem, TaskSeries,
    };

    fn time(hour: u8, minute: u8) -> ClockTime {
        ClockTime::new(hour, minute).unwrap()
    }

    #[test]
    fn one_offs_only_appear_on_their_day() {
        let mut state = AppState::default();
        let day = DayKey::parse("2026-02-10").unwrap();
        state.tasks.push(TaskItem::new("dentist", time(15, 0), day));
        state.tasks.push(TaskItem::new("call", time(9, 0), day.next()));

        let tasks = materialize(day, &state);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "dentist");
        assert!(matches!(tasks[0].origin, TaskOrigin::OneOff(_)));
    }

    #[test]
    fn override_time_replaces_series_default() {
        let mut state = AppState::default();
        let day = DayKey::parse("2026-02-10").unwrap();
        let series = TaskSeries::new("water plants", time(8, 0), RecurrenceRule::Daily);
        state.upsert_override(TaskInstanceOverride::reschedule(series.id, day, time(18, 30)));
        state.series.push(series);

        let tasks = materialize(day, &state);
        assert_eq!(tasks[0].time, time(18, 30));
        assert_eq!(materialize(day.next(), &state)[0].time, time(8, 0));
    }

    #[test]
    fn inactive_series_are_skipped() {
        let mut state = AppState::default();
        let mut series = TaskSeries::new("paused", time(8, 0), RecurrenceRule::Daily);
        series.is_active = false;
        state.series.push(series);
        assert!(materialize(DayKey::parse("2026-02-10").unwrap(), &state).is_empty());
    }

    #[test]
    fn equal_times_keep_input_order() {
        let mut state = AppState::default();
        let day = DayKey::parse("2026-02-10").unwrap();
        state.series.push(TaskSeries::new("series", time(9, 0), RecurrenceRule::Daily));
        state.tasks.push(TaskItem::new("first", time(9, 0), day));
        state.tasks.push(TaskItem::new("second", time(9, 0), day));
        state.tasks.push(TaskItem::new("early", time(6, 0), day));

        let titles: Vec<String> = materialize(day, &state)
            .into_iter()
            .map(|task| task.title)
            .collect();
        assert_eq!(titles, vec!["early", "first", "second", "series"]);
    }

    #[test]
    fn completion_flags_come_from_completions_and_items() {
        let mut state = AppState::default();
        let day = DayKey::parse("2026-02-10").unwrap();
        let series = TaskSeries::new("run", time(7, 0), RecurrenceRule::Daily);
        let series_instance = series.instance_id(day);
        state.series.push(series);
        let mut item = TaskItem::new("done already", time(8, 0), day);
        item.is_completed = true;
        state.tasks.push(item);
        state.mark_completed(day, series_instance.clone());

        let tasks = materialize(day, &state);
        assert!(tasks.iter().all(|task| task.is_completed));
        assert!(find_instance(day, &state, &series_instance).is_some());
        assert!(find_instance(day, &state, &InstanceId::from_raw("missing")).is_none());
    }
}
