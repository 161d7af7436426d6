//! Scanward CLI -- command-line interface for the security scan orchestrator
//!
//! Runs scans in-process through `scanward-orchestrator`, checks the scan
//! engine, and inspects configuration.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;
use tracing::{debug, warn};

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        use colored::Colorize;
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let loaded = commands::load_config(&cli.config).await;

    // Logging comes up before a config error is reported, using defaults.
    let general = loaded
        .as_ref()
        .map(|l| l.config.general.clone())
        .unwrap_or_default();
    logging::init_tracing(&general, cli.log_level.as_deref())
        .map_err(|e| CliError::Command(e.to_string()))?;
    scanward_core::metrics::describe_all();

    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
        Commands::Scan(args) => {
            let config = with_source(loaded, &cli.config)?;
            commands::scan::execute(args, &config, &writer).await
        }
        Commands::Engine => {
            let config = with_source(loaded, &cli.config)?;
            commands::engine::execute(&config, &writer).await
        }
    }
}

fn with_source(
    loaded: Result<commands::LoadedConfig, CliError>,
    path: &std::path::Path,
) -> Result<scanward_core::config::ScanwardConfig, CliError> {
    let loaded = loaded?;
    if loaded.from_file {
        debug!(path = %path.display(), "configuration loaded");
    } else {
        warn!(path = %path.display(), "configuration file not found, using defaults");
    }
    Ok(loaded.config)
}
