use anyhow::Result;
use std::path::Path;

use crossrelay_core::RelayConfig;

use crate::cli::ConfigCommands;
use crate::config::{load, redacted};
use crate::output::OutputFormat;
use crate::output::json::print_json;

pub fn run(path: &Path, command: ConfigCommands, format: OutputFormat) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            if format.is_json() {
                return print_json(&serde_json::json!({
                    "path": path,
                    "exists": path.exists(),
                }));
            }
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => show(&load(path)?, format),
    }
}

fn show(config: &RelayConfig, format: OutputFormat) -> Result<()> {
    let config = redacted(config);
    if format.is_json() {
        return print_json(&config);
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
