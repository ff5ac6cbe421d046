//! Live schema introspection
//!
//! Table shapes are read from `PRAGMA table_info` and memoized per table, so
//! a save call introspects each table at most once.

pub mod cache;

pub use cache::{ColumnInfo, TableInfo, TableSchemaCache};
