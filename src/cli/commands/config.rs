//! Config command
//!
//! Prints the pool configuration after defaults, the configuration file,
//! `CORRAL_POOL_*` environment variables and `-p` overrides are applied.

use super::CommandContext;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use corral::config::PoolConfig;

/// Format for printing the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Json,
    Yaml,
    /// `key=value` lines
    Properties,
}

/// Arguments for the config command
#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    /// Print the configuration in this format
    #[arg(long, value_enum, default_value = "toml")]
    pub format: ConfigFormat,
}

impl ConfigArgs {
    /// Execute the config command
    pub fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        print!("{}", render(&ctx.pool_config, self.format)?);
        Ok(0)
    }
}

/// Render a configuration in the given format.
pub fn render(config: &PoolConfig, format: ConfigFormat) -> Result<String> {
    let rendered = match format {
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Json => format!("{}\n", serde_json::to_string_pretty(config)?),
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
        ConfigFormat::Properties => {
            let value = serde_json::to_value(config)?;
            let mut out = String::new();
            if let serde_json::Value::Object(map) = value {
                for (key, value) in map {
                    match value {
                        serde_json::Value::String(s) => out.push_str(&format!("{key}={s}\n")),
                        other => out.push_str(&format!("{key}={other}\n")),
                    }
                }
            }
            out
        }
    };
    Ok(rendered)
}
