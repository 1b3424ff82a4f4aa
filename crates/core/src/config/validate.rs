use std::time::Duration;

use super::{
    types::{Config, GcsConfig, S3Config},
    ConfigError,
};

/// Longest lifetime both S3 and GCS accept for a signed URL
const MAX_SIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Validate configuration shared by every command
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.hasty.api_key.trim().is_empty() {
        return Err(invalid("hasty.api_key must be set (HASTY_API_KEY)"));
    }
    if config.hasty.api_url.trim().is_empty() {
        return Err(invalid("hasty.api_url cannot be empty"));
    }
    if config.hasty.request_timeout_secs == 0 {
        return Err(invalid("hasty.request_timeout_secs cannot be 0"));
    }

    let import = &config.import;
    if import.queue_capacity == 0 {
        return Err(invalid("import.queue_capacity cannot be 0"));
    }
    if import.page_size == 0 {
        return Err(invalid("import.page_size cannot be 0"));
    }
    if import.sign_ttl_secs == 0 || import.sign_ttl() > MAX_SIGN_TTL {
        return Err(invalid("import.sign_ttl_secs must be between 1 and 604800"));
    }
    if import.submit_timeout_secs == 0 {
        return Err(invalid("import.submit_timeout_secs cannot be 0"));
    }
    if import.storage_timeout_secs == 0 {
        return Err(invalid("import.storage_timeout_secs cannot be 0"));
    }
    if import.max_consecutive_errors == 0 {
        return Err(invalid("import.max_consecutive_errors cannot be 0"));
    }

    Ok(())
}

/// Return the S3 section, failing when it is absent or lacks credentials
pub fn require_s3(config: &Config) -> Result<&S3Config, ConfigError> {
    let s3 = config
        .s3
        .as_ref()
        .ok_or_else(|| invalid("s3 section is required for S3 imports"))?;

    if s3.access_key_id.is_empty() {
        return Err(invalid("s3.access_key_id must be set (AWS_ACCESS_KEY_ID)"));
    }
    if s3.secret_access_key.is_empty() {
        return Err(invalid(
            "s3.secret_access_key must be set (AWS_SECRET_ACCESS_KEY)",
        ));
    }
    if s3.bootstrap_region.is_empty() {
        return Err(invalid("s3.bootstrap_region cannot be empty"));
    }

    Ok(s3)
}

/// Return the GCS section, failing when it is absent
pub fn require_gcs(config: &Config) -> Result<&GcsConfig, ConfigError> {
    let gcs = config
        .gcs
        .as_ref()
        .ok_or_else(|| invalid("gcs section is required for GCS imports (GCP_KEY_PATH)"))?;

    if gcs.key_path.as_os_str().is_empty() {
        return Err(invalid("gcs.key_path cannot be empty"));
    }

    Ok(gcs)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
