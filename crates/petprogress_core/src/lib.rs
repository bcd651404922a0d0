//! Core domain logic for PetProgress.
//! This crate is the single source of truth for scheduling and pet invariants,
//! shared by the host app and the display process.

pub mod db;
pub mod logging;
pub mod model;
pub mod pet;
pub mod schedule;
pub mod service;
pub mod store;

pub use logging::{
    default_log_level, init_logging, init_logging_as, logging_status, ProcessRole,
};
pub use model::day_key::{DayKey, DayKeyError};
pub use model::pet::PetState;
pub use model::stage::{Stage, StageConfigError, StageTable};
pub use model::state::AppState;
pub use model::task::{
    ClockTime, ClockTimeError, InstanceId, RecurrenceRule, SeriesId, TaskId, TaskInstanceOverride,
    TaskItem, TaskSeries,
};
pub use pet::closeout::CloseoutReport;
pub use pet::evolution::{PetEvolutionEngine, PetTransition};
pub use schedule::materialize::{materialize, ConcreteTask, TaskOrigin};
pub use schedule::timeline::{Timeline, TimelineEntry, TimelineScheduler};
pub use schedule::window::{active_tasks, is_within_window, next_top_of_hour};
pub use service::task_service::{
    ActionOutcome, DaySnapshot, ServiceResult, TaskService, TaskServiceError,
};
pub use store::{
    FileStateStore, MemoryStateStore, SqliteStateStore, StateStore, StoreError, StoreResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
