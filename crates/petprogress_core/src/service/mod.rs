//! Core use-case services.
//!
//! # Responsibility
//! - Turn host actions into single store cycles.
//! - Keep FFI and CLI layers decoupled from storage details.

pub mod task_service;
