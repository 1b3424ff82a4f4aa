//! HTTP client for the Hasty public API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::HastyConfig;

use super::types::{DatasetBody, ExternalImageBody};
use super::{Dataset, ExternalImage, ExternalImageRequest, HastyError, IngestionClient};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "X-Api-Key";

/// Hasty API client.
pub struct HastyClient {
    client: Client,
    api_key: String,
    api_base: String,
    request_timeout: Duration,
}

impl HastyClient {
    pub fn new(config: &HastyConfig) -> Result<Self, HastyError> {
        let client = Client::builder()
            .user_agent(concat!("hasty-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HastyError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_base: config.api_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    fn project_url(&self, project_id: &str, resource: &str) -> String {
        format!(
            "{}/v1/projects/{}/{}",
            self.api_base,
            urlencoding::encode(project_id),
            resource
        )
    }

    /// Send a request and decode a JSON body, mapping failures to `HastyError`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<T, HastyError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HastyError::Timeout(timeout)
                } else {
                    HastyError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HastyError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| HastyError::Json(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl IngestionClient for HastyClient {
    async fn submit_external_image(
        &self,
        request: &ExternalImageRequest,
    ) -> Result<ExternalImage, HastyError> {
        let url = self.project_url(&request.project_id, "image_uploads/external");
        debug!(filename = %request.filename, "Submitting external image");

        // The caller bounds this call with its own timeout; the per-request
        // one only stops a stuck connection from outliving the process.
        let builder = self
            .client
            .post(&url)
            .json(&ExternalImageBody::from(request));
        self.send_json(builder, self.request_timeout.max(Duration::from_secs(60)))
            .await
    }

    async fn create_dataset(&self, project_id: &str, name: &str) -> Result<Dataset, HastyError> {
        let url = self.project_url(project_id, "datasets");
        debug!(project_id = project_id, name = name, "Creating dataset");

        let builder = self.client.post(&url).json(&DatasetBody { name });
        self.send_json(builder, self.request_timeout).await
    }
}
