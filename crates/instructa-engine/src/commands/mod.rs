//! Command orchestration layer.
//!
//! High-level entry points that validate, open a transaction, drive the
//! store, and fold every failure into a structured result.

pub mod engine_command;
pub mod save;
