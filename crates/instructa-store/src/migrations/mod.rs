//! Migration framework
//!
//! - Embedded SQL migrations for the instruction-project schema
//! - Idempotent application, one transaction per migration
//! - SHA-256 checksums recorded and re-verified on every run

mod checksums;
mod embedded;
mod runner;

pub use embedded::{get_migrations, Migration};
pub use runner::apply_migrations;
