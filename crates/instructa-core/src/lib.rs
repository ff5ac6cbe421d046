//! instructa core - domain model and pure rules for project-data persistence
//!
//! This crate provides the I/O-free half of the save engine:
//! - `ProjectChanges` / `SaveConfig` / `SaveResult` data model
//! - Identifier validation for every dynamically composed SQL name
//! - Value coercion from JSON row values to storage-native values
//! - Structured error facility and logging facility shared by all crates

pub mod coercion;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod rules;

// Re-export commonly used types
pub use coercion::{to_storage_value, StorageValue};
pub use errors::{ExError, ExErrorKind, InstructaError, Result};
pub use model::{AuditChangeType, ProjectChanges, Row, SaveConfig, SaveResult};
