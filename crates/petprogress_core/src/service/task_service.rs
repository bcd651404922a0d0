//! Task actions and settings over the shared record.
//!
//! # Responsibility
//! - Provide the entry points the host calls when the user acts.
//! - Turn each action into exactly one `load -> mutate -> save` cycle.
//!
//! # Invariants
//! - Unknown or already-finished instances are benign outcomes, never errors,
//!   and never write.
//! - A skipped occurrence disappears from its day so closeout does not count
//!   it as missed a second time.
//! - Task titles are never logged.

use crate::model::day_key::DayKey;
use crate::model::pet::PetState;
use crate::model::state::AppState;
use crate::model::task::{
    ClockTime, InstanceId, RecurrenceRule, SeriesId, TaskId, TaskInstanceOverride, TaskItem,
    TaskSeries,
};
use crate::pet::closeout::{self, CloseoutReport};
use crate::pet::evolution::{PetEvolutionEngine, PetTransition};
use crate::schedule::materialize::{materialize, ConcreteTask, TaskOrigin};
use crate::schedule::window::{active_tasks, is_instance_active, window_candidates};
use crate::store::{update, Mutation, StateStore, StoreError};
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, TaskServiceError>;

#[derive(Debug)]
pub enum TaskServiceError {
    Store(StoreError),
    EmptyTitle,
    /// Weekly/monthly rule with nothing to match.
    EmptyRecurrence,
    UnknownSeries(SeriesId),
    /// The series has no occurrence on that day.
    OccurrenceNotScheduled { series_id: SeriesId, day_key: DayKey },
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::EmptyTitle => write!(f, "task title cannot be empty"),
            Self::EmptyRecurrence => write!(f, "recurrence rule matches no day"),
            Self::UnknownSeries(id) => write!(f, "series not found: {id}"),
            Self::OccurrenceNotScheduled { series_id, day_key } => {
                write!(f, "series {series_id} has no occurrence on {day_key}")
            }
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for TaskServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Result of a complete/skip action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed {
        on_time: bool,
        transition: PetTransition,
    },
    Skipped {
        transition: PetTransition,
    },
    NotFound,
    AlreadyDone,
}

impl ActionOutcome {
    /// Short label for logs and bridge envelopes.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Skipped { .. } => "skipped",
            Self::NotFound => "not_found",
            Self::AlreadyDone => "already_done",
        }
    }

    pub fn transition(&self) -> Option<&PetTransition> {
        match self {
            Self::Completed { transition, .. } | Self::Skipped { transition } => Some(transition),
            Self::NotFound | Self::AlreadyDone => None,
        }
    }
}

/// What the host renders for the current app day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySnapshot {
    pub day_key: DayKey,
    pub tasks: Vec<ConcreteTask>,
    pub active: Vec<ConcreteTask>,
    pub pet: PetState,
    pub stage_name: String,
    pub stage_asset: String,
    pub progress: f64,
    pub grace_minutes: u16,
}

/// Use-case service over one injected store.
pub struct TaskService<S: StateStore> {
    store: S,
    engine: PetEvolutionEngine,
}

impl<S: StateStore> TaskService<S> {
    pub fn new(store: S, engine: PetEvolutionEngine) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &PetEvolutionEngine {
        &self.engine
    }

    /// Read-only view of the app day containing `now`.
    pub fn current_tasks<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> ServiceResult<DaySnapshot> {
        let state = self.store.load()?;
        Ok(self.snapshot(&state, now))
    }

    /// Checks off one instance of the current app day, or a neighbouring
    /// day's instance whose window is still open.
    ///
    /// On time means inside the grace window around the instance's own hour.
    pub fn complete_task<Tz: TimeZone>(
        &self,
        instance_id: &InstanceId,
        now: &DateTime<Tz>,
    ) -> ServiceResult<ActionOutcome> {
        let completed_at = now.with_timezone(&Utc);
        let outcome = update(&self.store, |state| {
            let Some(task) = actionable_instance(state, instance_id, now) else {
                return Mutation::Discard(ActionOutcome::NotFound);
            };
            if task.is_completed {
                return Mutation::Discard(ActionOutcome::AlreadyDone);
            }

            let on_time = is_instance_active(&task, state.reset_time, now, state.grace_minutes);
            state.mark_completed(task.day_key, task.instance_id.clone());
            if let TaskOrigin::OneOff(item_id) = task.origin {
                if let Some(item) = state.tasks.iter_mut().find(|item| item.id == item_id) {
                    item.is_completed = true;
                    item.completed_at = Some(completed_at);
                }
            }
            let transition = self.engine.on_check(&mut state.pet, on_time);
            Mutation::Commit(ActionOutcome::Completed {
                on_time,
                transition,
            })
        })?;
        log_action("task_complete", instance_id, &outcome);
        Ok(outcome)
    }

    /// Gives up on one instance. Lookup follows `complete_task`.
    pub fn skip_task<Tz: TimeZone>(
        &self,
        instance_id: &InstanceId,
        now: &DateTime<Tz>,
    ) -> ServiceResult<ActionOutcome> {
        let outcome = update(&self.store, |state| {
            let Some(task) = actionable_instance(state, instance_id, now) else {
                return Mutation::Discard(ActionOutcome::NotFound);
            };
            if task.is_completed {
                return Mutation::Discard(ActionOutcome::AlreadyDone);
            }

            let transition = self.engine.on_miss(&mut state.pet);
            match task.origin {
                TaskOrigin::Series(series_id) => {
                    state.upsert_override(TaskInstanceOverride::deletion(series_id, task.day_key));
                }
                TaskOrigin::OneOff(item_id) => state.tasks.retain(|item| item.id != item_id),
            }
            Mutation::Commit(ActionOutcome::Skipped { transition })
        })?;
        log_action("task_skip", instance_id, &outcome);
        Ok(outcome)
    }

    /// Adds a one-off task on `day_key`.
    pub fn add_task(
        &self,
        title: &str,
        scheduled_at: ClockTime,
        day_key: DayKey,
    ) -> ServiceResult<TaskId> {
        let title = normalize_title(title)?;
        let item = TaskItem::new(title, scheduled_at, day_key);
        let id = item.id;
        update(&self.store, |state| {
            state.tasks.push(item);
            Mutation::Commit(())
        })?;
        info!("event=task_add module=service status=ok task_id={id} day={day_key}");
        Ok(id)
    }

    /// Adds a recurring series.
    pub fn add_series(
        &self,
        title: &str,
        scheduled_time: ClockTime,
        rule: RecurrenceRule,
    ) -> ServiceResult<SeriesId> {
        let title = normalize_title(title)?;
        if rule_is_empty(&rule) {
            return Err(TaskServiceError::EmptyRecurrence);
        }
        let series = TaskSeries::new(title, scheduled_time, rule);
        let id = series.id;
        update(&self.store, |state| {
            state.series.push(series);
            Mutation::Commit(())
        })?;
        info!("event=series_add module=service status=ok series_id={id}");
        Ok(id)
    }

    /// Removes a series with its overrides. Returns `false` when absent.
    pub fn delete_series(&self, series_id: SeriesId) -> ServiceResult<bool> {
        let removed = update(&self.store, |state| {
            let before = state.series.len();
            state.series.retain(|series| series.id != series_id);
            if state.series.len() == before {
                return Mutation::Discard(false);
            }
            state
                .overrides
                .retain(|entry| entry.series_id != series_id);
            Mutation::Commit(true)
        })?;
        info!(
            "event=series_delete module=service status={} series_id={series_id}",
            if removed { "ok" } else { "skip" }
        );
        Ok(removed)
    }

    /// Moves one occurrence to another time on the same day.
    pub fn reschedule_occurrence(
        &self,
        series_id: SeriesId,
        day_key: DayKey,
        time: ClockTime,
    ) -> ServiceResult<()> {
        self.override_occurrence(TaskInstanceOverride::reschedule(series_id, day_key, time))
    }

    /// Removes one occurrence without touching the series.
    pub fn delete_occurrence(&self, series_id: SeriesId, day_key: DayKey) -> ServiceResult<()> {
        self.override_occurrence(TaskInstanceOverride::deletion(series_id, day_key))
    }

    fn override_occurrence(&self, entry: TaskInstanceOverride) -> ServiceResult<()> {
        let series_id = entry.series_id;
        let day_key = entry.day_key;
        let deleted = entry.is_deleted;
        update(&self.store, |state| {
            let Some(series) = state.series_by_id(series_id) else {
                return Mutation::Discard(Err(TaskServiceError::UnknownSeries(series_id)));
            };
            if !series.recurrence_rule.covers(day_key) {
                return Mutation::Discard(Err(TaskServiceError::OccurrenceNotScheduled {
                    series_id,
                    day_key,
                }));
            }
            state.upsert_override(entry);
            Mutation::Commit(Ok(()))
        })??;
        info!(
            "event=occurrence_override module=service status=ok series_id={series_id} day={day_key} deleted={deleted}"
        );
        Ok(())
    }

    /// Sets the grace window, clamped to `0..=180`. Returns the stored value.
    pub fn set_grace_minutes(&self, minutes: i64) -> ServiceResult<u16> {
        let stored = update(&self.store, |state| {
            state.set_grace_minutes(minutes);
            Mutation::Commit(state.grace_minutes)
        })?;
        info!("event=settings_update module=service status=ok grace_minutes={stored}");
        Ok(stored)
    }

    pub fn set_rollover_enabled(&self, enabled: bool) -> ServiceResult<()> {
        update(&self.store, |state| {
            state.rollover_enabled = enabled;
            Mutation::Commit(())
        })?;
        info!("event=settings_update module=service status=ok rollover_enabled={enabled}");
        Ok(())
    }

    pub fn set_reset_time(&self, reset_time: ClockTime) -> ServiceResult<()> {
        update(&self.store, |state| {
            state.reset_time = reset_time;
            Mutation::Commit(())
        })?;
        info!("event=settings_update module=service status=ok reset_time={reset_time}");
        Ok(())
    }

    /// Settles every day that ended before `now`. Saves only when something
    /// was settled.
    pub fn run_due_closeouts<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> ServiceResult<Vec<CloseoutReport>> {
        let reports = update(&self.store, |state| {
            let reports = closeout::run_due_closeouts(&self.engine, state, now);
            if reports.iter().any(CloseoutReport::applied) {
                Mutation::Commit(reports)
            } else {
                Mutation::Discard(reports)
            }
        })?;
        debug!(
            "event=closeout_run module=service status=ok days={}",
            reports.len()
        );
        Ok(reports)
    }

    fn snapshot<Tz: TimeZone>(&self, state: &AppState, now: &DateTime<Tz>) -> DaySnapshot {
        let day_key = DayKey::for_instant(now, state.reset_time);
        let tasks = materialize(day_key, state);
        let active = active_tasks(state, now);
        DaySnapshot {
            day_key,
            active,
            tasks,
            stage_name: self.engine.stage_name(&state.pet).to_string(),
            stage_asset: self.engine.stage_asset(&state.pet).to_string(),
            progress: self.engine.progress(&state.pet),
            pet: state.pet.clone(),
            grace_minutes: state.grace_minutes,
        }
    }
}

/// Any instance of the current app day, or a neighbouring day's instance
/// still inside its window.
fn actionable_instance<Tz: TimeZone>(
    state: &AppState,
    instance_id: &InstanceId,
    now: &DateTime<Tz>,
) -> Option<ConcreteTask> {
    let today = DayKey::for_instant(now, state.reset_time);
    window_candidates(state, now)
        .into_iter()
        .filter(|task| &task.instance_id == instance_id)
        .find(|task| {
            task.day_key == today
                || is_instance_active(task, state.reset_time, now, state.grace_minutes)
        })
}

fn normalize_title(title: &str) -> ServiceResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskServiceError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

fn rule_is_empty(rule: &RecurrenceRule) -> bool {
    match rule {
        RecurrenceRule::Daily => false,
        RecurrenceRule::Weekly { weekdays } => weekdays.is_empty(),
        RecurrenceRule::Monthly { days_of_month } => {
            !days_of_month.iter().any(|day| (1..=31).contains(day))
        }
    }
}

fn log_action(event: &str, instance_id: &InstanceId, outcome: &ActionOutcome) {
    match outcome.transition() {
        Some(transition) => info!(
            "event={} module=service status=ok instance_id={} outcome={} stage_before={} stage_after={} xp_after={}",
            event,
            instance_id,
            outcome.label(),
            transition.before.stage_index,
            transition.after.stage_index,
            transition.after.stage_xp
        ),
        None => info!(
            "event={} module=service status=skip instance_id={} outcome={}",
            event,
            instance_id,
            outcome.label()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_title, rule_is_empty, ActionOutcome, TaskServiceError};
    use crate::model::task::RecurrenceRule;

    #[test]
    fn titles_are_trimmed_and_must_not_be_blank() {
        assert_eq!(normalize_title("  Gym ").unwrap(), "Gym");
        assert!(matches!(
            normalize_title("   "),
            Err(TaskServiceError::EmptyTitle)
        ));
    }

    #[test]
    fn empty_rules_are_detected() {
        assert!(!rule_is_empty(&RecurrenceRule::Daily));
        assert!(rule_is_empty(&RecurrenceRule::Weekly { weekdays: vec![] }));
        assert!(rule_is_empty(&RecurrenceRule::Monthly {
            days_of_month: vec![0, 40]
        }));
    }

    #[test]
    fn benign_outcomes_carry_no_transition() {
        assert!(ActionOutcome::NotFound.transition().is_none());
        assert_eq!(ActionOutcome::AlreadyDone.label(), "already_done");
    }
}
