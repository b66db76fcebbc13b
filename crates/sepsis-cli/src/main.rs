use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sepsis_cli::commands::{onset, preprocess, readmissions, resolve};
use sepsis_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    match command {
        Commands::Preprocess { json } => preprocess::run(&mut writer, &config, *json)?,
        Commands::Resolve {
            kind,
            stays,
            input,
            output,
        } => resolve::run(&mut writer, &config, (*kind).into(), stays, input, output)?,
        Commands::Onset {
            antibiotics,
            cultures,
            output,
        } => onset::run(&mut writer, &config, antibiotics, cultures, output)?,
        Commands::Readmissions { input, output } => {
            readmissions::run(&mut writer, &config, input, output)?;
        }
    }
    writer.flush()?;

    Ok(())
}
