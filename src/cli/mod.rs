//! CLI command handling
//!
//! Loads benchmark files, runs them and formats the reports.

mod render;

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

use crate::assembly::{BenchmarkConfig, RandomTemplates, VerbatimTemplates};
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{paths, Error, Result};
use crate::engine::{BenchmarkExecutor, SuiteRegistry};
use crate::session::{LoopbackConnector, LoopbackScript};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            files,
            script,
            json,
            config,
        } => run(&files, &script, json, config.as_deref()).await,

        Commands::Validate { files } => validate(&files),

        Commands::Config { config } => {
            let loaded = load_config(config.as_deref())?;
            match config.or_else(paths::config_path) {
                Some(path) if path.exists() => println!("Config file: {}", path.display()),
                Some(path) => println!("Config file: {} (not found, using defaults)", path.display()),
                None => println!("Config file: none (no config directory on this platform)"),
            }
            println!("\n{}", loaded.to_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

async fn run(files: &[PathBuf], script: &Path, json: bool, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let script = LoopbackScript::load(script)?;

    // Every file is assembled before the first session opens
    let mut registry = SuiteRegistry::new();
    for file in files {
        let benchmark = BenchmarkConfig::load(file)?;
        let suite = benchmark.into_suite(&RandomTemplates, &config.timeouts)?;
        registry.register_suite(suite);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current unit");
            let _ = shutdown_tx.send(true);
        }
    });

    let connector = Arc::new(LoopbackConnector::new(script));
    let mut executor = BenchmarkExecutor::new(connector, &config).with_shutdown(shutdown_rx);
    let reports = executor.execute_all(&registry).await;

    if json {
        // Text output is skipped, so the full report goes to the log instead
        for report in &reports {
            report.log_report();
        }
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            render::print_report(report, executor.evaluator());
        }
    }
    Ok(())
}

fn validate(files: &[PathBuf]) -> Result<()> {
    let mut invalid = 0;
    for file in files {
        let checked = BenchmarkConfig::load(file).and_then(|benchmark| {
            let suite = benchmark.into_suite(&VerbatimTemplates, &Default::default())?;
            Ok(suite.unit_count())
        });
        match checked {
            Ok(units) => println!("  {} {} ({} units)", "✓".green(), file.display(), units),
            Err(e) => {
                invalid += 1;
                println!("  {} {}: {}", "✗".red(), file.display(), e);
            }
        }
    }

    if invalid > 0 {
        return Err(Error::Config(format!(
            "{} of {} benchmark files are invalid",
            invalid,
            files.len()
        )));
    }
    println!("\n{} {}", "✓".green().bold(), "All benchmark files are valid".green().bold());
    Ok(())
}
