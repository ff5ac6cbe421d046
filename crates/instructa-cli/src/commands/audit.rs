//! Audit command
//!
//! Usage: instructa audit --db <PATH> --table <AUDIT_TABLE> [--id <ROW_ID>]

use clap::Args;
use instructa_core::model::PRIMARY_KEY_COLUMN;
use instructa_core::rules::validate_identifier;
use instructa_core::StorageValue;
use instructa_store::ProjectRepo;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Project database file
    #[arg(long)]
    pub db: PathBuf,

    /// Audit table to read, e.g. audit_steps
    #[arg(long)]
    pub table: String,

    /// Only rows recorded for this data-row id
    #[arg(long)]
    pub id: Option<String>,
}

/// Execute audit command
pub fn execute(args: AuditArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate_identifier(&args.table)?;

    let conn = instructa_store::db::open(&args.db)?;
    let rows = match &args.id {
        Some(id) => ProjectRepo::read_rows_where(
            &conn,
            &args.table,
            PRIMARY_KEY_COLUMN,
            &StorageValue::Text(id.clone()),
        )?,
        None => ProjectRepo::list_rows(&conn, &args.table)?,
    };

    for row in &rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}
