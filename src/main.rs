//! rulebench - benchmark harness for event-driven rule engines
//!
//! Sends synthetic input events per test unit, collects the actions that come
//! back and reports how well they match what the rules should produce.

use clap::Parser;
use commands::Commands;
use rulebench::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "rulebench", about = "Rule engine benchmark harness")]
#[command(version, long_about = None)]
struct Cli {
    /// Debug-level logging for this crate
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        if e.is_config() {
            eprintln!("Hint: `rulebench validate <FILES>` checks benchmark files, `rulebench config` shows settings");
        }
        std::process::exit(1);
    }
}
