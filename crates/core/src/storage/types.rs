//! Storage types.

use thiserror::Error;

/// Path separator used by both S3 and GCS keys.
pub const KEY_SEPARATOR: char = '/';

/// One listed entry of a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Full object key.
    pub key: String,
    /// Whether the entry is a folder placeholder rather than a file.
    pub is_directory_marker: bool,
}

impl ObjectDescriptor {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let is_directory_marker = key.ends_with(KEY_SEPARATOR);
        Self {
            key,
            is_directory_marker,
        }
    }
}

/// Errors from storage backends.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Client construction, credential or region resolution failed.
    #[error("Storage setup failed: {0}")]
    Setup(String),

    /// `prepare` was not called (or failed) before listing or signing.
    #[error("Storage backend is not prepared for bucket access")]
    NotPrepared,

    /// The listing call itself failed.
    #[error("Failed to list objects: {0}")]
    Listing(String),

    /// A single object could not be signed.
    #[error("Failed to sign URL for {key}: {message}")]
    Signing { key: String, message: String },

    /// The call did not finish in time.
    #[error("Storage call timed out")]
    Timeout,
}
