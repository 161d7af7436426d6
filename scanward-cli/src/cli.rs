//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use scanward_core::types::ScanType;

/// Scanward -- asynchronous security scan orchestrator.
///
/// Use `scanward <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "scanward", version, about, long_about = None)]
pub struct Cli {
    /// Path to the scanward.toml configuration file.
    #[arg(short, long, default_value = "scanward.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan one or more images or repositories and wait for the results.
    Scan(ScanArgs),

    /// Check scan engine availability.
    Engine,

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- scan ----

/// Kind of scan target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetKind {
    /// Container image reference (e.g. `nginx:latest`).
    Image,
    /// Source repository URL.
    Repo,
}

impl From<TargetKind> for ScanType {
    fn from(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Image => ScanType::Image,
            TargetKind::Repo => ScanType::Repo,
        }
    }
}

/// Submit scans and wait until every task reaches a terminal state.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Targets to scan.
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,

    /// Target kind.
    #[arg(long = "type", value_enum, default_value = "image")]
    pub kind: TargetKind,

    /// Severity levels to request (comma separated; default from config).
    #[arg(long, value_delimiter = ',')]
    pub severity: Vec<String>,

    /// Skip the vulnerability database update.
    #[arg(long)]
    pub skip_update: bool,

    /// Ignore vulnerabilities without a fixed version.
    #[arg(long)]
    pub ignore_unfixed: bool,

    /// Make sure an HTML report exists for each completed scan.
    #[arg(long)]
    pub html: bool,

    /// Make sure a PDF report exists for each completed scan.
    #[arg(long)]
    pub pdf: bool,

    /// Status polling interval in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub poll_interval_ms: u64,
}

// ---- config ----

/// Manage scanward configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, engine, tasks, report).
        #[arg(long)]
        section: Option<String>,
    },
}
