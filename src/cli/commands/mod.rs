//! Subcommands module for corral CLI
//!
//! This module contains all the subcommand implementations.

pub mod config;
pub mod probe;

use crate::cli::output::OutputFormatter;
use anyhow::{bail, Result};
use corral::config::{PoolConfig, PoolConfigBuilder};
use std::collections::HashMap;
use tracing::debug;

/// Common context shared between commands
pub struct CommandContext {
    /// Effective pool configuration
    pub pool_config: PoolConfig,
    /// Output formatter
    pub output: OutputFormatter,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli) -> Result<Self> {
        let overrides = parse_overrides(&cli.pool)?;
        let pool_config = PoolConfigBuilder::load(cli.config.as_deref())?
            .with_properties(&overrides)
            .build()?;
        debug!(config = ?pool_config, "Resolved pool configuration");

        Ok(Self {
            pool_config,
            output: OutputFormatter::new(!cli.no_color, cli.output),
        })
    }
}

/// Parse `key=value` overrides from the command line.
pub fn parse_overrides(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut overrides = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid pool override '{}': expected key=value", pair);
        };
        overrides.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(overrides)
}
