//! instructa CLI
//!
//! Command-line access to instruction-project databases

use clap::{Parser, Subcommand};
use instructa_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "instructa")]
#[command(about = "instructa - Instruction project persistence", long_about = None)]
struct Cli {
    /// Human-readable debug logging on stderr instead of JSON at info
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or upgrade the project schema
    Migrate(commands::migrate::MigrateArgs),
    /// Apply a JSON change batch in one transaction
    Save(commands::save::SaveArgs),
    /// Print audit-log rows as JSON lines
    Audit(commands::audit::AuditArgs),
}

fn main() {
    let cli = Cli::parse();

    init(if cli.verbose {
        Profile::Development
    } else {
        Profile::Production
    });

    let result = match cli.command {
        Commands::Migrate(args) => commands::migrate::execute(args),
        Commands::Save(args) => commands::save::execute(args),
        Commands::Audit(args) => commands::audit::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
