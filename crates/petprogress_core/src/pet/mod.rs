//! Pet progression: the evolution state machine and the daily closeout
//! driver built on top of it.
//!
//! # Invariants
//! - Only this module mutates `PetState`.

pub mod closeout;
pub mod evolution;
