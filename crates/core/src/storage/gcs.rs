//! Google Cloud Storage backend.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::CredentialProvider;
use reqwest::{Client, Method};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::GcsConfig;

use super::{ListState, ObjectDescriptor, ObjectStorage, StorageError};

/// Endpoint used unless the key file overrides it.
const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";

/// GCS backend authenticated with a service-account key.
///
/// Listing goes through the JSON API so object names come back exactly as
/// stored, trailing `/` and empty segments included. The object_store client
/// supplies the OAuth token for those calls and signs the download URLs with
/// the service-account private key.
pub struct GcsStorage {
    config: GcsConfig,
    bucket: OnceCell<BucketClient>,
}

/// Everything bound to the bucket of the current run.
struct BucketClient {
    name: String,
    store: GoogleCloudStorage,
    http: Client,
    base_url: String,
}

/// Fields of the service-account key file read besides the credentials.
///
/// Emulators and tests point `gcs_base_url` at a local server.
#[derive(Debug, Default, Deserialize)]
struct KeyFileEndpoint {
    #[serde(default)]
    gcs_base_url: Option<String>,
}

/// One page of `objects.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectsPage {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

impl GcsStorage {
    pub fn new(config: GcsConfig) -> Self {
        Self {
            config,
            bucket: OnceCell::new(),
        }
    }

    fn setup_error(&self, e: impl std::fmt::Display) -> StorageError {
        StorageError::Setup(format!(
            "Unable to instantiate GCS client from {}: {}",
            self.config.key_path.display(),
            e
        ))
    }

    async fn connect(&self, bucket: &str) -> Result<BucketClient, StorageError> {
        debug!(key_path = ?self.config.key_path, "Configure GCS client");
        let store = GoogleCloudStorageBuilder::new()
            .with_service_account_path(self.config.key_path.to_string_lossy().into_owned())
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| self.setup_error(e))?;

        let key_file = tokio::fs::read_to_string(&self.config.key_path)
            .await
            .map_err(|e| self.setup_error(e))?;
        let endpoint: KeyFileEndpoint =
            serde_json::from_str(&key_file).map_err(|e| self.setup_error(e))?;
        let base_url = endpoint
            .gcs_base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .user_agent(concat!("hasty-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| self.setup_error(e))?;

        Ok(BucketClient {
            name: bucket.to_string(),
            store,
            http,
            base_url,
        })
    }

    fn bucket_client(&self, bucket: &str) -> Result<&BucketClient, StorageError> {
        match self.bucket.get() {
            Some(client) if client.name == bucket => Ok(client),
            _ => Err(StorageError::NotPrepared),
        }
    }
}

impl BucketClient {
    fn objects_url(&self) -> String {
        format!(
            "{}/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(&self.name)
        )
    }

    /// Fetch one page of object names starting with `prefix`.
    async fn list_page(
        &self,
        prefix: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ObjectsPage, StorageError> {
        let credential = self
            .store
            .credentials()
            .get_credential()
            .await
            .map_err(|e| StorageError::Listing(format!("Unable to get GCS token: {}", e)))?;

        let max_results = page_size.max(1).to_string();
        let mut query = vec![("maxResults", max_results.as_str())];
        if !prefix.is_empty() {
            query.push(("prefix", prefix));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let mut request = self.http.get(self.objects_url()).query(&query);
        // Empty when the key file disables OAuth
        if !credential.bearer.is_empty() {
            request = request.bearer_auth(&credential.bearer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Listing(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Listing(format!(
                "GCS returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| StorageError::Listing(format!("Failed to parse GCS listing: {}", e)))
    }
}

#[async_trait]
impl ObjectStorage for GcsStorage {
    fn name(&self) -> &str {
        "gcs"
    }

    async fn prepare(&self, bucket: &str) -> Result<(), StorageError> {
        self.bucket.get_or_try_init(|| self.connect(bucket)).await?;
        // Fails if an earlier run prepared another bucket
        self.bucket_client(bucket)?;
        Ok(())
    }

    fn list<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
        page_size: usize,
    ) -> BoxStream<'a, Result<ObjectDescriptor, StorageError>> {
        let client = match self.bucket_client(bucket) {
            Ok(client) => client,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        stream::try_unfold(ListState::Start, move |state| async move {
            let token = match state {
                ListState::Start => None,
                ListState::Next(token) => Some(token),
                ListState::Done => return Ok(None),
            };

            let page = client.list_page(prefix, page_size, token.as_deref()).await?;
            let objects: Vec<Result<ObjectDescriptor, StorageError>> = page
                .items
                .into_iter()
                .map(|item| Ok(ObjectDescriptor::new(item.name)))
                .collect();
            debug!(bucket = bucket, objects = objects.len(), "Fetched GCS listing page");

            let next = match page.next_page_token {
                Some(token) if !token.is_empty() => ListState::Next(token),
                _ => ListState::Done,
            };

            Ok::<_, StorageError>(Some((stream::iter(objects), next)))
        })
        .try_flatten()
        .boxed()
    }

    async fn sign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let client = self.bucket_client(bucket)?;
        let signing_error = |message: String| StorageError::Signing {
            key: key.to_string(),
            message,
        };

        // Keys with empty segments have no object_store path and fail here
        let path = ObjectPath::parse(key).map_err(|e| signing_error(e.to_string()))?;
        let url = client
            .store
            .signed_url(Method::GET, &path, ttl)
            .await
            .map_err(|e| signing_error(e.to_string()))?;

        Ok(url.to_string())
    }
}
