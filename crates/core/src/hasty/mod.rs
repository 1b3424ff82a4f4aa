//! Hasty ingestion API.
//!
//! This module provides an `IngestionClient` trait for handing signed URLs
//! to Hasty, which downloads the files into a dataset, plus the HTTP
//! implementation used in production.

mod client;
mod types;

pub use client::HastyClient;
pub use types::*;

use async_trait::async_trait;

/// Trait for the remote side of an import.
#[async_trait]
pub trait IngestionClient: Send + Sync {
    /// Ask the service to fetch `request.url` into the dataset.
    async fn submit_external_image(
        &self,
        request: &ExternalImageRequest,
    ) -> Result<ExternalImage, HastyError>;

    /// Create an empty dataset in a project.
    async fn create_dataset(&self, project_id: &str, name: &str) -> Result<Dataset, HastyError>;
}
