//! logan command-line entry point

mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod sink;

use std::process::ExitCode;

use clap::Parser;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init(&cli).await {
        eprintln!("error: {e:#}");
        return ExitCode::from(2);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

/// Sets up logging from the config file; a broken file still gets logging
/// with defaults so the command can report it.
async fn init(cli: &Cli) -> anyhow::Result<()> {
    let mut general = commands::load_config(&cli.config)
        .await
        .map(|c| c.general)
        .unwrap_or_default();
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    logging::init_tracing(&general)?;
    tracing::debug!(config = %cli.config.display(), "logan starting");
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Parse(args) => commands::parse::execute(args, &cli.config, &writer).await,
        Commands::Search(args) => commands::search::execute(args, &cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}
