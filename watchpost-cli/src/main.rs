//! Watchpost CLI -- command-line front end for the scan engine.
//!
//! Loads `watchpost.toml` (or defaults), initializes logging and
//! dispatches to one handler per subcommand. Errors are mapped to exit
//! codes by [`CliError::exit_code`].

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;
use watchpost_core::config::GeneralConfig;

use crate::cli::{Cli, Commands};
use crate::commands::ConfigSource;
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let source = ConfigSource::resolve(cli.config.as_deref());
    let loaded = source.load().await;

    // `config validate` reports load errors itself, so logging falls back
    // to defaults instead of bailing out here.
    let mut general: GeneralConfig = loaded
        .as_ref()
        .map(|config| config.general.clone())
        .unwrap_or_default();
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    if let Err(e) = logging::init_tracing(&general) {
        eprintln!("warning: {e}");
    }

    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Config(args) => commands::config::execute(args, &source, &writer).await,
        Commands::Scan(args) => commands::scan::execute(args, loaded?, &writer).await,
        Commands::Plans(args) => commands::plans::execute(args, &loaded?, &writer).await,
        Commands::Plugins(args) => commands::plugins::execute(args, &loaded?, &writer),
    }
}
