//! FFI use-case API for host-facing calls.
//!
//! # Responsibility
//! - Expose task actions, closeouts and the display timeline as plain
//!   envelopes.
//! - Resolve the shared store and stage table once per process.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Every call reloads the shared record; nothing is cached between calls.
//! - Failures are reported in the envelope, never thrown.

use chrono::{DateTime, Local, TimeZone, Weekday};
use log::warn;
use petprogress_core::{
    core_version as core_version_inner, init_logging_as, ping as ping_inner, ActionOutcome,
    ClockTime, ConcreteTask, DayKey, FileStateStore, InstanceId, PetEvolutionEngine, PetState,
    ProcessRole, RecurrenceRule, SqliteStateStore, StageTable, StateStore, TaskOrigin,
    TaskService, TimelineScheduler,
};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const STATE_PATH_ENV: &str = "PETPROGRESS_STATE_PATH";
const STAGE_CONFIG_ENV: &str = "PETPROGRESS_STAGE_CONFIG";
const DEFAULT_STATE_FILE_NAME: &str = "petprogress_state.json";
const TIMELINE_DEFAULT_ENTRIES: u32 = 24;
const TIMELINE_MAX_ENTRIES: u32 = 48;

static STATE_PATH: OnceLock<PathBuf> = OnceLock::new();
static ENGINE: OnceLock<PetEvolutionEngine> = OnceLock::new();

type DynStore = Box<dyn StateStore>;

/// Minimal health-check API for bridge smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    init_logging_for(ProcessRole::Host, &level, &log_dir)
}

/// Initializes logging for the display process.
///
/// Same contract as [`init_logging`]; files are written as
/// `petprogress_display*.log` so both processes can share `log_dir`.
#[flutter_rust_bridge::frb(sync)]
pub fn init_display_logging(level: String, log_dir: String) -> String {
    init_logging_for(ProcessRole::Display, &level, &log_dir)
}

fn init_logging_for(role: ProcessRole, level: &str, log_dir: &str) -> String {
    match init_logging_as(role, level, log_dir) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One task instance as rendered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub instance_id: String,
    pub title: String,
    pub hour: u8,
    pub minute: u8,
    pub day_key: String,
    pub is_completed: bool,
    /// Inside the grace window at the time of the call.
    pub is_active: bool,
    pub is_recurring: bool,
}

/// Pet projection for renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct PetView {
    pub stage_index: u32,
    pub stage_xp: i64,
    pub stage_name: String,
    pub stage_asset: String,
    /// Fraction of the current threshold, `1.0` at the final stage.
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentTasksResponse {
    pub ok: bool,
    pub day_key: String,
    pub tasks: Vec<TaskView>,
    pub pet: Option<PetView>,
    pub grace_minutes: u16,
    pub message: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub ok: bool,
    /// `completed|skipped|not_found|already_done|created|updated|failed`.
    pub outcome: String,
    /// Created task/series id, when any.
    pub id: Option<String>,
    pub pet: Option<PetView>,
    pub message: String,
}

impl ActionResponse {
    fn created(message: impl Into<String>, id: String) -> Self {
        Self {
            ok: true,
            outcome: "created".to_string(),
            id: Some(id),
            pet: None,
            message: message.into(),
        }
    }

    fn updated(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            outcome: "updated".to_string(),
            id: None,
            pet: None,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            outcome: "failed".to_string(),
            id: None,
            pet: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseoutResponse {
    pub ok: bool,
    /// Day keys settled by this call, oldest first.
    pub closed_days: Vec<String>,
    pub rolled_over: u32,
    pub pet: Option<PetView>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntryView {
    pub epoch_ms: i64,
    pub day_key: String,
    pub active: Vec<TaskView>,
    pub pending_count: u32,
    pub pet: PetView,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineResponse {
    pub ok: bool,
    pub entries: Vec<TimelineEntryView>,
    /// When the host should request a new timeline.
    pub refresh_after_epoch_ms: Option<i64>,
    pub message: String,
}

/// Tasks of the current app day with their active flags, preceded by any
/// neighbouring day's instance still inside its window.
///
/// # FFI contract
/// - Sync call, store-backed read; never writes.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn current_tasks() -> CurrentTasksResponse {
    match open_service() {
        Ok(service) => current_tasks_at(&service, &Local::now()),
        Err(message) => CurrentTasksResponse {
            ok: false,
            day_key: String::new(),
            tasks: Vec::new(),
            pet: None,
            grace_minutes: 0,
            message,
        },
    }
}

/// Checks off one instance of the current app day.
///
/// Unknown or already-completed ids return `ok = true` with outcome
/// `not_found` / `already_done`; nothing is written.
#[flutter_rust_bridge::frb(sync)]
pub fn complete_task(instance_id: String) -> ActionResponse {
    match open_service() {
        Ok(service) => complete_task_at(&service, &instance_id, &Local::now()),
        Err(message) => ActionResponse::failure(message),
    }
}

/// Skips one instance of the current app day; the pet takes a miss.
#[flutter_rust_bridge::frb(sync)]
pub fn skip_task(instance_id: String) -> ActionResponse {
    match open_service() {
        Ok(service) => skip_task_at(&service, &instance_id, &Local::now()),
        Err(message) => ActionResponse::failure(message),
    }
}

/// Adds a one-off task. `day_key` defaults to the current app day.
#[flutter_rust_bridge::frb(sync)]
pub fn add_task(title: String, hour: u8, minute: u8, day_key: Option<String>) -> ActionResponse {
    match open_service() {
        Ok(service) => add_task_at(&service, &title, hour, minute, day_key, &Local::now()),
        Err(message) => ActionResponse::failure(message),
    }
}

/// Adds a recurring series.
///
/// Input semantics:
/// - `recurrence`: `daily|weekly|monthly`.
/// - `days`: ISO weekdays `1..=7` (Monday = 1) for weekly, days of month
///   `1..=31` for monthly, ignored for daily.
#[flutter_rust_bridge::frb(sync)]
pub fn add_series(
    title: String,
    hour: u8,
    minute: u8,
    recurrence: String,
    days: Vec<u32>,
) -> ActionResponse {
    match open_service() {
        Ok(service) => add_series_with(&service, &title, hour, minute, &recurrence, &days),
        Err(message) => ActionResponse::failure(message),
    }
}

/// Sets the grace window; out-of-range values are clamped to `0..=180`.
#[flutter_rust_bridge::frb(sync)]
pub fn set_grace_minutes(minutes: i64) -> ActionResponse {
    match open_service() {
        Ok(service) => match service.set_grace_minutes(minutes) {
            Ok(stored) => ActionResponse::updated(format!("Grace window set to {stored} min.")),
            Err(err) => ActionResponse::failure(format!("set_grace_minutes failed: {err}")),
        },
        Err(message) => ActionResponse::failure(message),
    }
}

/// Settles every day that ended since the last closeout.
///
/// # FFI contract
/// - Safe to call on every foreground; repeated calls are no-ops.
#[flutter_rust_bridge::frb(sync)]
pub fn run_closeouts() -> CloseoutResponse {
    match open_service() {
        Ok(service) => run_closeouts_at(&service, &Local::now()),
        Err(message) => CloseoutResponse {
            ok: false,
            closed_days: Vec::new(),
            rolled_over: 0,
            pet: None,
            message,
        },
    }
}

/// Hour-aligned snapshots for the display process.
///
/// `count` defaults to 24 and is capped at 48.
#[flutter_rust_bridge::frb(sync)]
pub fn timeline(count: Option<u32>) -> TimelineResponse {
    match open_service() {
        Ok(service) => timeline_at(&service, count, &Local::now()),
        Err(message) => TimelineResponse {
            ok: false,
            entries: Vec::new(),
            refresh_after_epoch_ms: None,
            message,
        },
    }
}

fn current_tasks_at<S: StateStore, Tz: TimeZone>(
    service: &TaskService<S>,
    now: &DateTime<Tz>,
) -> CurrentTasksResponse {
    match service.current_tasks(now) {
        Ok(snapshot) => {
            // Neighbouring days only show up while their window is open.
            let carried = snapshot
                .active
                .iter()
                .filter(|task| task.day_key != snapshot.day_key)
                .map(|task| to_task_view(task, true));
            let tasks = carried
                .chain(
                    snapshot
                        .tasks
                        .iter()
                        .map(|task| to_task_view(task, snapshot.active.contains(task))),
                )
                .collect::<Vec<_>>();
            CurrentTasksResponse {
                ok: true,
                day_key: snapshot.day_key.to_string(),
                message: format!("{} task(s), {} active.", tasks.len(), snapshot.active.len()),
                tasks,
                pet: Some(to_pet_view(service.engine(), &snapshot.pet)),
                grace_minutes: snapshot.grace_minutes,
            }
        }
        Err(err) => CurrentTasksResponse {
            ok: false,
            day_key: String::new(),
            tasks: Vec::new(),
            pet: None,
            grace_minutes: 0,
            message: format!("current_tasks failed: {err}"),
        },
    }
}

fn complete_task_at<S: StateStore, Tz: TimeZone>(
    service: &TaskService<S>,
    instance_id: &str,
    now: &DateTime<Tz>,
) -> ActionResponse {
    let id = InstanceId::from_raw(instance_id);
    match service.complete_task(&id, now) {
        Ok(outcome) => to_action_response(service.engine(), &outcome),
        Err(err) => ActionResponse::failure(format!("complete_task failed: {err}")),
    }
}

fn skip_task_at<S: StateStore, Tz: TimeZone>(
    service: &TaskService<S>,
    instance_id: &str,
    now: &DateTime<Tz>,
) -> ActionResponse {
    let id = InstanceId::from_raw(instance_id);
    match service.skip_task(&id, now) {
        Ok(outcome) => to_action_response(service.engine(), &outcome),
        Err(err) => ActionResponse::failure(format!("skip_task failed: {err}")),
    }
}

fn add_task_at<S: StateStore, Tz: TimeZone>(
    service: &TaskService<S>,
    title: &str,
    hour: u8,
    minute: u8,
    day_key: Option<String>,
    now: &DateTime<Tz>,
) -> ActionResponse {
    let time = match ClockTime::new(hour, minute) {
        Ok(time) => time,
        Err(err) => return ActionResponse::failure(format!("add_task failed: {err}")),
    };
    let day_key = match day_key.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => match DayKey::parse(raw) {
            Ok(day_key) => day_key,
            Err(err) => return ActionResponse::failure(format!("add_task failed: {err}")),
        },
        _ => match service.current_tasks(now) {
            Ok(snapshot) => snapshot.day_key,
            Err(err) => return ActionResponse::failure(format!("add_task failed: {err}")),
        },
    };
    match service.add_task(title, time, day_key) {
        Ok(id) => ActionResponse::created("Task created.", id.to_string()),
        Err(err) => ActionResponse::failure(format!("add_task failed: {err}")),
    }
}

fn add_series_with<S: StateStore>(
    service: &TaskService<S>,
    title: &str,
    hour: u8,
    minute: u8,
    recurrence: &str,
    days: &[u32],
) -> ActionResponse {
    let time = match ClockTime::new(hour, minute) {
        Ok(time) => time,
        Err(err) => return ActionResponse::failure(format!("add_series failed: {err}")),
    };
    let rule = match parse_recurrence(recurrence, days) {
        Ok(rule) => rule,
        Err(message) => return ActionResponse::failure(format!("add_series failed: {message}")),
    };
    match service.add_series(title, time, rule) {
        Ok(id) => ActionResponse::created("Series created.", id.to_string()),
        Err(err) => ActionResponse::failure(format!("add_series failed: {err}")),
    }
}

fn run_closeouts_at<S: StateStore, Tz: TimeZone>(
    service: &TaskService<S>,
    now: &DateTime<Tz>,
) -> CloseoutResponse {
    let reports = match service.run_due_closeouts(now) {
        Ok(reports) => reports,
        Err(err) => {
            return CloseoutResponse {
                ok: false,
                closed_days: Vec::new(),
                rolled_over: 0,
                pet: None,
                message: format!("run_closeouts failed: {err}"),
            }
        }
    };

    let applied = reports
        .iter()
        .filter(|report| report.applied())
        .collect::<Vec<_>>();
    let rolled_over = applied.iter().map(|report| report.rolled_over).sum::<usize>();
    let pet = applied
        .last()
        .map(|report| to_pet_view(service.engine(), &report.transition.after));
    CloseoutResponse {
        ok: true,
        message: if applied.is_empty() {
            "Nothing to close.".to_string()
        } else {
            format!("Closed {} day(s).", applied.len())
        },
        closed_days: applied
            .iter()
            .map(|report| report.day_key.to_string())
            .collect(),
        rolled_over: u32::try_from(rolled_over).unwrap_or(u32::MAX),
        pet,
    }
}

fn timeline_at<S: StateStore, Tz: TimeZone>(
    service: &TaskService<S>,
    count: Option<u32>,
    now: &DateTime<Tz>,
) -> TimelineResponse {
    let count = normalize_timeline_count(count);
    let scheduler = TimelineScheduler::new(service.store(), service.engine().clone())
        .with_entry_count(count as usize);
    let timeline = match scheduler.build(now) {
        Ok(timeline) => timeline,
        Err(err) => {
            return TimelineResponse {
                ok: false,
                entries: Vec::new(),
                refresh_after_epoch_ms: None,
                message: format!("timeline failed: {err}"),
            }
        }
    };

    let entries = timeline
        .entries
        .iter()
        .map(|entry| TimelineEntryView {
            epoch_ms: entry.timestamp.timestamp_millis(),
            day_key: entry.day_key.to_string(),
            active: entry
                .active
                .iter()
                .map(|task| to_task_view(task, true))
                .collect(),
            pending_count: u32::try_from(
                entry.tasks.iter().filter(|task| !task.is_completed).count(),
            )
            .unwrap_or(u32::MAX),
            pet: to_pet_view(service.engine(), &entry.pet),
        })
        .collect::<Vec<_>>();
    TimelineResponse {
        ok: true,
        message: format!("{} entries.", entries.len()),
        entries,
        refresh_after_epoch_ms: Some(timeline.refresh_after.timestamp_millis()),
    }
}

fn normalize_timeline_count(count: Option<u32>) -> u32 {
    match count {
        Some(0) | None => TIMELINE_DEFAULT_ENTRIES,
        Some(value) if value > TIMELINE_MAX_ENTRIES => TIMELINE_MAX_ENTRIES,
        Some(value) => value,
    }
}

fn parse_recurrence(recurrence: &str, days: &[u32]) -> Result<RecurrenceRule, String> {
    match recurrence.trim().to_ascii_lowercase().as_str() {
        "daily" => Ok(RecurrenceRule::Daily),
        "weekly" => {
            let weekdays = days
                .iter()
                .map(|day| iso_weekday(*day))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RecurrenceRule::Weekly { weekdays })
        }
        "monthly" => {
            if let Some(bad) = days.iter().find(|day| !(1..=31).contains(*day)) {
                return Err(format!("day of month out of range: {bad}"));
            }
            Ok(RecurrenceRule::Monthly {
                days_of_month: days.to_vec(),
            })
        }
        other => Err(format!(
            "unsupported recurrence `{other}`; expected daily|weekly|monthly"
        )),
    }
}

fn iso_weekday(day: u32) -> Result<Weekday, String> {
    match day {
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        7 => Ok(Weekday::Sun),
        other => Err(format!("weekday out of range: {other}")),
    }
}

fn to_task_view(task: &ConcreteTask, is_active: bool) -> TaskView {
    TaskView {
        instance_id: task.instance_id.to_string(),
        title: task.title.clone(),
        hour: task.time.hour(),
        minute: task.time.minute(),
        day_key: task.day_key.to_string(),
        is_completed: task.is_completed,
        is_active,
        is_recurring: matches!(task.origin, TaskOrigin::Series(_)),
    }
}

fn to_pet_view(engine: &PetEvolutionEngine, pet: &PetState) -> PetView {
    PetView {
        stage_index: u32::try_from(pet.stage_index).unwrap_or(u32::MAX),
        stage_xp: pet.stage_xp,
        stage_name: engine.stage_name(pet).to_string(),
        stage_asset: engine.stage_asset(pet).to_string(),
        progress: engine.progress(pet),
    }
}

fn to_action_response(engine: &PetEvolutionEngine, outcome: &ActionOutcome) -> ActionResponse {
    let message = match outcome {
        ActionOutcome::Completed { on_time: true, .. } => "Completed on time.",
        ActionOutcome::Completed { on_time: false, .. } => "Completed late.",
        ActionOutcome::Skipped { .. } => "Skipped.",
        ActionOutcome::NotFound => "No such task today.",
        ActionOutcome::AlreadyDone => "Already completed.",
    };
    ActionResponse {
        ok: true,
        outcome: outcome.label().to_string(),
        id: None,
        pet: outcome
            .transition()
            .map(|transition| to_pet_view(engine, &transition.after)),
        message: message.to_string(),
    }
}

fn open_service() -> Result<TaskService<DynStore>, String> {
    let store = open_store(&resolve_state_path()).inspect_err(|message| {
        warn!("event=ffi_store_open module=ffi status=error error={message}");
    })?;
    Ok(TaskService::new(store, resolve_engine().clone()))
}

/// `.sqlite3`/`.db` paths use the SQLite backend, anything else the JSON file.
fn open_store(path: &Path) -> Result<DynStore, String> {
    let is_sqlite = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "sqlite3" | "sqlite" | "db"));
    if is_sqlite {
        let store = SqliteStateStore::open(path)
            .map_err(|err| format!("state store open failed: {err}"))?;
        Ok(Box::new(store))
    } else {
        Ok(Box::new(FileStateStore::new(path)))
    }
}

fn resolve_state_path() -> PathBuf {
    STATE_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(STATE_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DEFAULT_STATE_FILE_NAME)
        })
        .clone()
}

fn resolve_engine() -> &'static PetEvolutionEngine {
    ENGINE.get_or_init(|| {
        let stages = match std::env::var(STAGE_CONFIG_ENV) {
            Ok(raw) if !raw.trim().is_empty() => StageTable::load_or_default(raw.trim()),
            _ => StageTable::builtin(),
        };
        PetEvolutionEngine::new(stages)
    })
}
