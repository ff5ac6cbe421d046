//! instructa engine - save orchestration
//!
//! Coordinates the core rules and the store into one atomic save call per
//! batch of project edits.

pub mod commands;

pub use commands::save::{apply_changes, save_project_data, SaveStats};
