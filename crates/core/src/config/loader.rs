use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "hasty.toml";

/// Conventional credential variables and the config keys they fill
const CREDENTIAL_VARS: &[(&str, &str)] = &[
    ("HASTY_API_KEY", "hasty.api_key"),
    ("AWS_ACCESS_KEY_ID", "s3.access_key_id"),
    ("AWS_SECRET_ACCESS_KEY", "s3.secret_access_key"),
    ("GCP_KEY_PATH", "gcs.key_path"),
];

/// Load configuration from an optional file with environment variable overrides.
///
/// An explicit `path` must exist. Without one, `hasty.toml` in the working
/// directory is used when present and the environment alone otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::new();

    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                figment = figment.merge(Toml::file(default_path));
            }
        }
    }

    figment = figment.merge(Env::prefixed("HASTY_").split("__"));
    for (var, key) in CREDENTIAL_VARS {
        figment = figment.merge(Env::raw().only(&[*var]).map(move |_| (*key).into()));
    }

    figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
