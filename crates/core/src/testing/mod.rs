//! Testing utilities and mock implementations.
//!
//! This module provides mocks of the storage and ingestion traits so a whole
//! import can run in-process without cloud credentials.
//!
//! # Example
//!
//! ```rust,ignore
//! use hasty_core::testing::{fixtures, MockIngestionClient, MockStorage};
//!
//! let storage = MockStorage::with_keys(&["a/", "a/img1.jpg"]);
//! let client = MockIngestionClient::new();
//!
//! let pipeline = ImportPipeline::new(Arc::new(storage), Arc::new(client), settings);
//! let outcome = pipeline.execute(&fixtures::target("bucket", "a/"), &token).await;
//! ```

mod mock_ingestion;
mod mock_storage;

pub use mock_ingestion::{MockIngestionClient, RecordedSubmission};
pub use mock_storage::MockStorage;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::pipeline::{ImportTarget, TransferDescriptor};

    /// Project every fixture target points at.
    pub const PROJECT_ID: &str = "8f2a3c44-6a0e-4a43-9a56-0d0f1b2c3d4e";

    /// Dataset every fixture target points at.
    pub const DATASET_ID: &str = "1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed";

    /// Create an import target into the fixture dataset.
    pub fn target(bucket: &str, prefix: &str) -> ImportTarget {
        ImportTarget {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            project_id: PROJECT_ID.to_string(),
            dataset_id: DATASET_ID.to_string(),
        }
    }

    /// Create a descriptor for `key` with a fake signed URL.
    pub fn descriptor(key: &str) -> TransferDescriptor {
        TransferDescriptor::new(
            format!("https://storage.mock/bucket/{}?signature=fixture", key),
            key,
        )
    }

    /// Create `count` image keys under `folder`, sorted like a bucket listing.
    pub fn image_keys(folder: &str, count: usize) -> Vec<String> {
        (1..=count)
            .map(|i| format!("{}img{:03}.jpg", folder, i))
            .collect()
    }
}
