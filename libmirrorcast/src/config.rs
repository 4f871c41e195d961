//! Configuration file loading for Mirrorcast
//!
//! The configuration file is JSON: optional top-level defaults plus an
//! `entries` array, one element per mirrored account. Turning that document
//! into validated [`Entry`](crate::entries::Entry) values is the job of
//! [`crate::entries`].

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::entries::{build_entries, Entry};
use crate::error::{ConfigError, Result};

/// Environment variable consulted when no path is given on the command line
pub const CONFIG_ENV_VAR: &str = "MIRRORCAST_CONFIG";

/// Read and parse a configuration file into a raw JSON document
pub fn load_config(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
    let config: Value = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
    Ok(config)
}

/// Load a configuration file and validate every entry in it
pub fn load_entries(path: &Path) -> Result<Vec<Entry>> {
    let config = load_config(path)?;
    let data_dir = resolve_data_path()?;
    build_entries(&config, &data_dir.to_string_lossy())
}

/// Resolve the configuration file path
///
/// Precedence: explicit path, then `MIRRORCAST_CONFIG`, then
/// `<config_dir>/mirrorcast/config.json` following the XDG Base Directory spec.
pub fn resolve_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand_path(path));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Ok(expand_path(&path));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("mirrorcast").join("config.json"))
}

/// Resolve the data directory path, the default ledger location
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("mirrorcast"))
}

/// Expand a leading `~` to the home directory
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}
