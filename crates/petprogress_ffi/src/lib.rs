//! Host bridge for the PetProgress app and display processes.

pub mod api;
