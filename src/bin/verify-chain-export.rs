use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

use attendance_ledger::chain::ChainExport;
use attendance_ledger::logging::{init_logging, LogFormat, DEFAULT_FILTER};

#[derive(Parser)]
#[command(name = "verify-chain-export")]
#[command(about = "Verify an exported attendance ledger chain")]
struct Args {
    /// Exported chain JSON (object from `chain show` or a bare block array)
    path: PathBuf,

    /// Difficulty of a bare block array; full exports carry their own
    #[arg(short, long)]
    difficulty: Option<usize>,

    /// Print per-block detail
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(DEFAULT_FILTER, LogFormat::Pretty);

    info!("Verifying chain export {}", args.path.display());
    let export = ChainExport::load(&args.path, args.difficulty)
        .with_context(|| format!("Failed to load {}", args.path.display()))?;
    let chain = export.into_chain();

    let fault = chain.verify().err();
    let genesis_fault = chain.verify_genesis().err();
    let tampered = chain.tampered_blocks();
    let valid = fault.is_none() && genesis_fault.is_none();

    if args.verbose {
        for block in chain.blocks() {
            eprintln!("  {}", block.summary());
        }
    }

    let result = json!({
        "name": chain.name(),
        "difficulty": chain.difficulty(),
        "blocks": chain.len(),
        "valid": valid,
        "fault": fault.map(|f| f.to_string()),
        "genesis_fault": genesis_fault.map(|f| f.to_string()),
        "tampered_blocks": tampered,
    });
    println!("{}", serde_json::to_string_pretty(&result)?);

    if valid {
        eprintln!("✓ {} verified ({} blocks)", chain.name(), chain.len());
        Ok(())
    } else {
        warn!("Chain {} failed verification", chain.name());
        eprintln!("✗ {} failed verification", chain.name());
        std::process::exit(1);
    }
}
