//! Attendance Ledger CLI
//!
//! Creates departments, classes and students, records attendance and runs
//! integrity checks against the SQLite-backed chain store. Results are
//! printed as JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use attendance_ledger::cli::{execute, exit_code, Cli, CommandContext};
use attendance_ledger::config::AppConfig;
use attendance_ledger::database::Database;
use attendance_ledger::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let outcome = run(cli).await;
    if let Err(e) = &outcome {
        error!("{:#}", e);
        eprintln!("error: {:#}", e);
    }
    std::process::exit(exit_code(&outcome));
}

async fn run(cli: Cli) -> Result<bool> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    init_logging(&config.logging.filter, config.logging.format);

    let database = Database::new(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    info!("Using database {}", config.database_url);

    let ctx = CommandContext::new(database, &config);
    execute(cli.command, &ctx, &mut std::io::stdout().lock()).await
}
