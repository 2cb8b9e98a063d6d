//! CLI command definitions
//!
//! Defines the clap commands for the rulebench CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run benchmark files against the loopback rule engine
    Run {
        /// Benchmark files (JSON, or YAML by extension)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Loopback script describing how the rule engine reacts
        #[arg(long, short)]
        script: PathBuf,

        /// Print reports as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Harness configuration file (default: platform config dir)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check benchmark files without running them
    Validate {
        /// Benchmark files (JSON, or YAML by extension)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the configuration file path and effective settings
    Config {
        /// Harness configuration file (default: platform config dir)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
