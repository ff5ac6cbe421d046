//! Save command
//!
//! Usage: instructa save --db <PATH> --changes <FILE.json> [--config <FILE.json|FILE.toml>]

use clap::Args;
use instructa_core::{ProjectChanges, SaveConfig};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Project database file
    #[arg(long)]
    pub db: PathBuf,

    /// JSON file holding `{ "changed": {...}, "deleted": {...} }`
    #[arg(long)]
    pub changes: PathBuf,

    /// Save config as JSON or TOML; defaults to the standard project layout
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Execute save command
///
/// Prints the `SaveResult` JSON on stdout and fails when the save did not commit.
pub fn execute(args: SaveArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.db.exists() {
        return Err(format!("database {} does not exist; run migrate first", args.db.display()).into());
    }

    let changes: ProjectChanges = serde_json::from_str(&std::fs::read_to_string(&args.changes)?)?;
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => SaveConfig::instruction_project(),
    };

    let mut conn = instructa_store::db::open(&args.db)?;
    let result = instructa_engine::save_project_data(&mut conn, &changes, &config);
    println!("{}", serde_json::to_string(&result)?);

    if result.success {
        Ok(())
    } else {
        Err(result.error.unwrap_or_default().into())
    }
}

/// Read a save config, choosing the format by file extension
fn load_config(path: &Path) -> Result<SaveConfig, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .map(|ext| ext == "toml")
        .unwrap_or(false);

    if is_toml {
        Ok(toml::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}
