//! Domain model for tasks, pet progression and the shared aggregate.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own the persisted wire shape (camelCase JSON) of every record.
//!
//! # Invariants
//! - Every record is plain data; no type here performs I/O.
//! - Day keys are only ever handled through `DayKey`.

pub mod day_key;
pub mod pet;
pub mod stage;
pub mod state;
pub mod task;
