//! corral - keyed connection pool toolkit
//!
//! This is the main entry point for the corral CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use corral::telemetry::LoggingBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    if let Err(e) = LoggingBuilder::new()
        .with_verbosity(cli.verbosity())
        .with_format(cli.log_format)
        .with_ansi(!cli.no_color)
        .init()
    {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let ctx = CommandContext::new(&cli)?;

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Probe(args) => args.execute(&ctx).await?,
        Commands::Config(args) => args.execute(&ctx)?,
    };

    std::process::exit(exit_code);
}
