//! Hasty API types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Error type for Hasty API calls.
#[derive(Debug, thiserror::Error)]
pub enum HastyError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// The run was cancelled while the call was in flight.
    #[error("Cancelled")]
    Cancelled,
}

/// Request to import a file by URL.
#[derive(Clone)]
pub struct ExternalImageRequest {
    pub project_id: String,
    pub dataset_id: String,
    /// Signed download URL, a credential in its own right.
    pub url: String,
    pub filename: String,
    /// Store a copy instead of a reference to `url`.
    pub copy: bool,
}

impl fmt::Debug for ExternalImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalImageRequest")
            .field("project_id", &self.project_id)
            .field("dataset_id", &self.dataset_id)
            .field("url", &"<redacted>")
            .field("filename", &self.filename)
            .field("copy", &self.copy)
            .finish()
    }
}

/// Wire body of an external upload.
#[derive(Debug, Serialize)]
pub(crate) struct ExternalImageBody<'a> {
    pub dataset_id: &'a str,
    pub url: &'a str,
    pub filename: &'a str,
    pub copy_original: bool,
}

impl<'a> From<&'a ExternalImageRequest> for ExternalImageBody<'a> {
    fn from(request: &'a ExternalImageRequest) -> Self {
        Self {
            dataset_id: &request.dataset_id,
            url: &request.url,
            filename: &request.filename,
            copy_original: request.copy,
        }
    }
}

/// Image record returned by an external upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalImage {
    pub id: String,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Wire body of a dataset creation.
#[derive(Debug, Serialize)]
pub(crate) struct DatasetBody<'a> {
    pub name: &'a str,
}

/// Dataset record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub norder: Option<f64>,
}
