//! Config file discovery and loading.
//!
//! Loads configuration from ~/.config/crossrelay/config.toml unless a path is
//! given, then layers environment secrets on top.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crossrelay_core::RelayConfig;

const REDACTED: &str = "***";

/// Get the default configuration file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("crossrelay").join("config.toml"))
}

/// Get the default database path
pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("crossrelay").join("relay.db"))
}

/// Explicit path first, then the per-user default.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(default_config_path)
        .context("Cannot determine config directory; pass --config")
}

/// Read the file and apply environment overrides.
pub fn load(path: &Path) -> Result<RelayConfig> {
    let mut config = RelayConfig::from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

/// `--db-path` beats `storage.db_path`, which beats the data-dir default.
pub fn resolve_db_path(explicit: Option<&Path>, config: &RelayConfig) -> Result<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config.storage.db_path.clone())
        .or_else(default_db_path)
        .context("Cannot determine data directory; pass --db-path")
}

/// Copy of `config` safe to print.
pub fn redacted(config: &RelayConfig) -> RelayConfig {
    let mut config = config.clone();
    for secret in [
        &mut config.telegram.bot_token,
        &mut config.translation.api_key,
        &mut config.transcription.api_key,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    config
}
