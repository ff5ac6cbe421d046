//! Repository layer for project tables
//!
//! Row-level SQL against tables whose names are only known at runtime

pub mod project_repo;

pub use project_repo::{ProjectRepo, RowSnapshot};
