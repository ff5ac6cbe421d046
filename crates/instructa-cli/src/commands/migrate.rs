//! Migrate command
//!
//! Usage: instructa migrate --db <PATH>

use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Project database file; created if missing
    #[arg(long)]
    pub db: PathBuf,
}

/// Execute migrate command
pub fn execute(args: MigrateArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = args.db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut conn = instructa_store::db::open(&args.db)?;
    instructa_store::migrations::apply_migrations(&mut conn)?;

    let applied: i64 = conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
    println!("✓ {} migrated ({} migrations applied)", args.db.display(), applied);
    Ok(())
}
