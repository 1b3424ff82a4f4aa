//! AWS S3 storage backend.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::S3Config;

use super::{ListState, ObjectDescriptor, ObjectStorage, StorageError};

/// Region S3 reports as an empty location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Provider name attached to the static credentials.
const CREDENTIALS_PROVIDER: &str = "hasty-s3-static";

/// S3 backend using static access keys.
///
/// The bucket's region is unknown up front, so `prepare` asks a client in
/// the bootstrap region for the bucket location and keeps a second client
/// bound to the real region for listing and signing.
pub struct S3Storage {
    config: S3Config,
    client: OnceCell<Client>,
}

impl S3Storage {
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    async fn build_client(&self, region: &str) -> Client {
        let credentials = Credentials::new(
            &self.config.access_key_id,
            &self.config.secret_access_key,
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if self.config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Client::from_conf(builder.build())
    }

    async fn resolve_client(&self, bucket: &str) -> Result<Client, StorageError> {
        debug!(region = %self.config.bootstrap_region, "Configure AWS client");
        let bootstrap = self.build_client(&self.config.bootstrap_region).await;

        // S3-compatible stores behind a custom endpoint rarely implement
        // GetBucketLocation, the configured region is authoritative there.
        if self.config.endpoint.is_some() {
            return Ok(bootstrap);
        }

        debug!(bucket = bucket, "Find out S3 bucket location region");
        let location = bootstrap
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::Setup(format!(
                    "Unable to get S3 bucket location: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let region = normalize_region(location.location_constraint().map(|c| c.as_str()));
        debug!(region = %region, "Re-instantiate AWS client with bucket region");
        Ok(self.build_client(&region).await)
    }

    fn client(&self) -> Result<&Client, StorageError> {
        self.client.get().ok_or(StorageError::NotPrepared)
    }
}

/// Map a GetBucketLocation answer to a region name.
fn normalize_region(constraint: Option<&str>) -> String {
    match constraint {
        None | Some("") => DEFAULT_REGION.to_string(),
        // Legacy alias still returned for old Ireland buckets
        Some("EU") => "eu-west-1".to_string(),
        Some(region) => region.to_string(),
    }
}

/// Clamp a page size to the range ListObjectsV2 accepts.
fn max_keys(page_size: usize) -> i32 {
    i32::try_from(page_size.max(1)).unwrap_or(i32::MAX)
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn name(&self) -> &str {
        "s3"
    }

    async fn prepare(&self, bucket: &str) -> Result<(), StorageError> {
        self.client
            .get_or_try_init(|| self.resolve_client(bucket))
            .await?;
        Ok(())
    }

    fn list<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
        page_size: usize,
    ) -> BoxStream<'a, Result<ObjectDescriptor, StorageError>> {
        let client = match self.client() {
            Ok(client) => client.clone(),
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        // MaxKeys=0 returns empty pages
        let max_keys = max_keys(page_size);

        stream::try_unfold(ListState::Start, move |state| {
            let client = client.clone();
            async move {
                let token = match state {
                    ListState::Start => None,
                    ListState::Next(token) => Some(token),
                    ListState::Done => return Ok(None),
                };

                let mut request = client.list_objects_v2().bucket(bucket).max_keys(max_keys);
                if !prefix.is_empty() {
                    request = request.prefix(prefix);
                }
                if let Some(token) = token {
                    request = request.continuation_token(token);
                }

                let page = request.send().await.map_err(|e| {
                    StorageError::Listing(format!("{}", DisplayErrorContext(&e)))
                })?;

                let objects: Vec<Result<ObjectDescriptor, StorageError>> = page
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(|key| Ok(ObjectDescriptor::new(key)))
                    .collect();
                debug!(bucket = bucket, objects = objects.len(), "Fetched S3 listing page");

                let next = match page.next_continuation_token() {
                    Some(token) if page.is_truncated().unwrap_or(false) => {
                        ListState::Next(token.to_string())
                    }
                    _ => ListState::Done,
                };

                Ok::<_, StorageError>(Some((stream::iter(objects), next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    async fn sign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let client = self.client()?;
        let signing_error = |message: String| StorageError::Signing {
            key: key.to_string(),
            message,
        };

        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| signing_error(e.to_string()))?;
        let request = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| signing_error(format!("{}", DisplayErrorContext(&e))))?;

        Ok(request.uri().to_string())
    }
}
