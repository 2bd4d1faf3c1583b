mod cli;
mod commands;
mod config;
mod logging;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = config::resolve_config_path(cli.config.as_deref())?;

    // `config` subcommands skip logging and validation.
    let check_only = match cli.command.unwrap_or(Commands::Run) {
        Commands::Config { command } => {
            return commands::config::run(&config_path, command, cli.format);
        }
        Commands::Check => true,
        Commands::Run => false,
    };

    let relay_config = config::load(&config_path)?;
    let _guard = logging::init(&relay_config.logging, cli.verbose)?;

    if check_only {
        return commands::check::run(&relay_config, cli.format);
    }

    let db_path = config::resolve_db_path(cli.db_path.as_deref(), &relay_config)?;
    tracing::info!(config = %config_path.display(), "Loaded configuration");
    commands::run::run(relay_config, &db_path).await
}
