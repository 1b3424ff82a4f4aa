use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub hasty: HastyConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub s3: Option<S3Config>,
    #[serde(default)]
    pub gcs: Option<GcsConfig>,
}

/// Hasty API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HastyConfig {
    /// API key, usually supplied through `HASTY_API_KEY`
    pub api_key: String,
    /// Base URL of the public API
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Timeout for one-off API calls (dataset creation etc.)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.hasty.ai".to_string()
}

fn default_request_timeout() -> u64 {
    5
}

/// Import pipeline tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Descriptors buffered between lister and importer.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Objects requested per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Lifetime of each signed URL in seconds.
    #[serde(default = "default_sign_ttl")]
    pub sign_ttl_secs: u64,

    /// Timeout of a single submission call in seconds.
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,

    /// Timeout of a single listing page fetch or signing call in seconds.
    #[serde(default = "default_storage_timeout")]
    pub storage_timeout_secs: u64,

    /// Consecutive failures a stage tolerates before the run is aborted.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Ask Hasty to copy the file instead of referencing the URL.
    #[serde(default = "default_copy_files")]
    pub copy_files: bool,
}

fn default_queue_capacity() -> usize {
    10
}

fn default_page_size() -> usize {
    100
}

fn default_sign_ttl() -> u64 {
    3600 // 1 hour
}

fn default_submit_timeout() -> u64 {
    5
}

fn default_storage_timeout() -> u64 {
    30
}

fn default_max_consecutive_errors() -> u32 {
    10
}

fn default_copy_files() -> bool {
    true
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            page_size: default_page_size(),
            sign_ttl_secs: default_sign_ttl(),
            submit_timeout_secs: default_submit_timeout(),
            storage_timeout_secs: default_storage_timeout(),
            max_consecutive_errors: default_max_consecutive_errors(),
            copy_files: default_copy_files(),
        }
    }
}

impl ImportConfig {
    pub fn sign_ttl(&self) -> Duration {
        Duration::from_secs(self.sign_ttl_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }
}

/// AWS S3 source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Config {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    /// Region used only to look up the bucket's real location
    #[serde(default = "default_bootstrap_region")]
    pub bootstrap_region: String,
    /// Custom endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_bootstrap_region() -> String {
    // Closest to Hasty, any region can answer GetBucketLocation
    "eu-central-1".to_string()
}

/// Google Cloud Storage source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GcsConfig {
    /// Service-account JSON key file
    pub key_path: PathBuf,
}

/// Sanitized config for diagnostics (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub hasty: SanitizedHastyConfig,
    pub import: ImportConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<SanitizedS3Config>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcs: Option<GcsConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedHastyConfig {
    pub api_url: String,
    pub api_key_configured: bool,
    pub request_timeout_secs: u64,
}

/// Sanitized S3 config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedS3Config {
    pub credentials_configured: bool,
    pub bootstrap_region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub force_path_style: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            hasty: SanitizedHastyConfig {
                api_url: config.hasty.api_url.clone(),
                api_key_configured: !config.hasty.api_key.is_empty(),
                request_timeout_secs: config.hasty.request_timeout_secs,
            },
            import: config.import.clone(),
            s3: config.s3.as_ref().map(|s| SanitizedS3Config {
                credentials_configured: !s.access_key_id.is_empty()
                    && !s.secret_access_key.is_empty(),
                bootstrap_region: s.bootstrap_region.clone(),
                endpoint: s.endpoint.clone(),
                force_path_style: s.force_path_style,
            }),
            gcs: config.gcs.clone(),
        }
    }
}
