//! Race configuration file loading
//!
//! The file format is picked from the extension: `.json` or `.toml`. Both use
//! the same camelCase keys (`laps`, `lapLen`, `penaltyLen`, `firingLines`,
//! `start`, `startDelta`).

use anyhow::{bail, Context, Result};
use biathlon_engine::{RaceConfig, RaceConfigFile};
use std::fs;
use std::path::Path;

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Determine the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match extension.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => bail!("Unsupported config file format: {:?}", path),
        }
    }
}

/// Parse config file content in the given format
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<RaceConfigFile> {
    let file = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };
    Ok(file)
}

/// Load and validate race configuration from a JSON or TOML file
pub fn load_config(path: &Path) -> Result<RaceConfig> {
    let format = ConfigFormat::from_path(path)?;

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let file = parse_config(&content, format)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    let config = RaceConfig::try_from(file)
        .with_context(|| format!("Invalid race configuration in {:?}", path))?;

    log::debug!(
        "Race configuration: {} laps of {}m, penalty lap {}m, {} firing lines",
        config.laps,
        config.lap_len,
        config.penalty_len,
        config.firing_lines
    );

    Ok(config)
}
