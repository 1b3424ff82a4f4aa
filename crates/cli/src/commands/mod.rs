pub mod dataset;
pub mod import;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use hasty_core::{load_config, validate_config, Config, SanitizedConfig};

/// Load and validate the configuration every command needs.
fn load(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => debug!("Loading configuration from the default location"),
    }

    let config = load_config(config_path).context("Failed to load config")?;
    validate_config(&config).context("Configuration validation failed")?;

    if let Ok(sanitized) = serde_json::to_string(&SanitizedConfig::from(&config)) {
        debug!(config = %sanitized, "Configuration loaded");
    }
    Ok(config)
}
