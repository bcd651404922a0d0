//! Time-based projections over `AppState`.
//!
//! # Responsibility
//! - Grace-window arithmetic and hour boundaries (`window`).
//! - Per-day task expansion (`materialize`).
//! - Hour-aligned snapshots for the display process (`timeline`).
//!
//! # Invariants
//! - Everything here is pure except `timeline`, which only reads the store.

pub mod materialize;
pub mod timeline;
pub mod window;
