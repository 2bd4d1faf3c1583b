use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "crossrelay")]
#[command(version, about = "CrossRelay - Telegram topic relay with translation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to ~/.config/crossrelay/config.toml)
    #[arg(short, long, global = true, env = "CROSSRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database path (defaults to ~/.local/share/crossrelay/relay.db)
    #[arg(long, visible_alias = "db", global = true, env = "CROSSRELAY_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay until interrupted (default)
    Run,

    /// Validate the configuration and print the route graph
    Check,

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved config file path
    Path,

    /// Print the effective configuration with secrets redacted
    Show,
}
