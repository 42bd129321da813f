//! CLI module for corral
//!
//! Argument parsing and subcommand dispatch for the `corral` binary.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use corral::telemetry::LogFormat;
use std::path::PathBuf;

/// corral - keyed connection pool toolkit
///
/// Probe servers through the pool and inspect the effective pool
/// configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "corral")]
#[command(version)]
#[command(about = "Keyed connection pool toolkit", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to pool configuration file (toml, yaml, json or properties)
    #[arg(short = 'c', long, global = true, env = "CORRAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pool setting override (key=value), applied after the file and environment
    #[arg(short = 'p', long = "pool", global = true, action = clap::ArgAction::Append)]
    pub pool: Vec<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Log output format
    #[arg(long, global = true, default_value = "compact")]
    pub log_format: LogFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
    /// YAML output
    Yaml,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Borrow and release connections to servers through the pool
    Probe(commands::probe::ProbeArgs),

    /// Print the effective pool configuration
    Config(commands::config::ConfigArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}
