//! instructa store - SQLite persistence for instruction projects
//!
//! Provides:
//! - Connection helpers and embedded, checksummed schema migrations
//! - Table schema cache backed by live introspection
//! - Row-level upsert/read/delete against runtime-named tables
//! - Audit recorder writing change snapshots into per-table audit logs

pub mod audit;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;
pub mod schema;

// Re-export key types
pub use audit::AuditRecorder;
pub use errors::Result;
pub use repo::{ProjectRepo, RowSnapshot};
pub use schema::{TableInfo, TableSchemaCache};
