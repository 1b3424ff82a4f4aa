//! Object storage abstraction.
//!
//! This module provides an `ObjectStorage` trait for listing a bucket and
//! deriving short-lived signed download URLs, with implementations for
//! AWS S3 and Google Cloud Storage.

mod gcs;
mod s3;
mod types;

pub use gcs::GcsStorage;
pub use s3::S3Storage;
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

/// Continuation state of a paged listing.
enum ListState {
    Start,
    Next(String),
    Done,
}

/// Trait for bucket listing and URL signing backends.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Backend name (e.g., "s3", "gcs")
    fn name(&self) -> &str;

    /// Resolve credentials and location for `bucket`.
    ///
    /// Called once per run before listing starts. Failing here is fatal for
    /// the run.
    async fn prepare(&self, _bucket: &str) -> Result<(), StorageError> {
        Ok(())
    }

    /// List objects under `prefix` lazily, fetching `page_size` entries per
    /// remote call. An empty prefix lists the whole bucket.
    fn list<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
        page_size: usize,
    ) -> BoxStream<'a, Result<ObjectDescriptor, StorageError>>;

    /// Create a GET URL for `key` valid for `ttl`.
    async fn sign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError>;
}
