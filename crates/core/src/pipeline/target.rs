//! What a run imports and where to.

use thiserror::Error;
use uuid::Uuid;

/// Errors for an import target that cannot be run.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Bucket name cannot be empty")]
    EmptyBucket,

    #[error("Project ID must be a UUID: {0}")]
    InvalidProjectId(String),

    #[error("Dataset ID must be a UUID: {0}")]
    InvalidDatasetId(String),
}

/// Source bucket and destination dataset of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTarget {
    pub bucket: String,
    /// Key prefix, a folder (`folder/sub/`) and/or a file name start
    /// (`folder/DCS_123`). Empty imports the whole bucket.
    pub prefix: String,
    pub project_id: String,
    pub dataset_id: String,
}

impl ImportTarget {
    pub fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Result<Self, TargetError> {
        let bucket = bucket.into().trim().to_string();
        if bucket.is_empty() {
            return Err(TargetError::EmptyBucket);
        }

        let project_id = project_id.into();
        let project_id = parse_uuid(&project_id)
            .ok_or_else(|| TargetError::InvalidProjectId(project_id.clone()))?;

        let dataset_id = dataset_id.into();
        let dataset_id = parse_uuid(&dataset_id)
            .ok_or_else(|| TargetError::InvalidDatasetId(dataset_id.clone()))?;

        Ok(Self {
            bucket,
            prefix: prefix.into(),
            project_id,
            dataset_id,
        })
    }
}

/// Parse a UUID, returning it in canonical hyphenated form.
pub fn parse_uuid(raw: &str) -> Option<String> {
    Uuid::parse_str(raw.trim())
        .ok()
        .map(|id| id.hyphenated().to_string())
}
