//! Output formatting for the corral CLI
//!
//! Colored human output, or a single JSON/YAML document for scripting.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use super::OutputFormat;

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// Selected output format
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, format: OutputFormat) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        colored::control::set_override(use_color);
        Self { use_color, format }
    }

    /// Whether output is a machine-readable document
    pub fn is_structured(&self) -> bool {
        self.format != OutputFormat::Human
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.is_structured() {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{}", line);
            println!("  {}  ", title);
            println!("{}\n", line);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.is_structured() {
            return;
        }

        println!("\n{}", title.cyan().bold());
        println!("{}", "-".repeat(title.len()).cyan());
    }

    /// Print a success line
    pub fn ok(&self, subject: &str, detail: &str) {
        if !self.is_structured() {
            println!("{}: [{}] {}", "ok".green(), subject, detail);
        }
    }

    /// Print a failure line
    pub fn failed(&self, subject: &str, detail: &str) {
        if !self.is_structured() {
            println!("{}: [{}] {}", "failed".red().bold(), subject, detail.red());
        }
    }

    /// Print a `key: value` line
    pub fn field(&self, key: &str, value: impl std::fmt::Display) {
        if !self.is_structured() {
            println!("  {:<22} {}", format!("{key}:").bold(), value);
        }
    }

    /// Emit a document in the selected structured format. No-op for human
    /// output.
    pub fn document<T: Serialize>(&self, value: &T) -> Result<()> {
        match self.format {
            OutputFormat::Human => {}
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        }
        Ok(())
    }
}
