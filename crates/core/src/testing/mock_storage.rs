//! Mock object storage for testing.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::storage::{ObjectDescriptor, ObjectStorage, StorageError};

/// Mock implementation of the ObjectStorage trait.
///
/// Keys are served in insertion order, `page_size` at a time, so tests can
/// reason about which page a key lands on.
///
/// Provides controllable behavior for testing:
/// - Fail `prepare` or any listing page
/// - Fail signing for chosen keys or for every key
/// - Delay page fetches and signing calls
/// - Track signed keys and page requests
///
/// # Example
///
/// ```rust,ignore
/// use hasty_core::testing::MockStorage;
///
/// let storage = MockStorage::with_keys(&["a/", "a/img1.jpg", "a/img2.jpg"]);
/// storage.fail_signing_for(&["a/img2.jpg"]).await;
///
/// // Run a pipeline with it...
///
/// assert_eq!(storage.signed_keys().await, vec!["a/img1.jpg"]);
/// ```
#[derive(Debug)]
pub struct MockStorage {
    /// Bucket content, in listing order.
    keys: Arc<RwLock<Vec<String>>>,
    /// Bucket `prepare` was last called with.
    prepared: Arc<RwLock<Option<String>>>,
    /// If set, `prepare` fails with this error.
    prepare_error: Arc<RwLock<Option<StorageError>>>,
    /// Listing pages that fail, by zero-based index.
    page_errors: Arc<RwLock<HashMap<usize, StorageError>>>,
    /// Number of page fetches started.
    page_requests: Arc<RwLock<usize>>,
    /// Delay before each page is returned.
    page_delay: Arc<RwLock<Duration>>,
    /// Keys whose signing fails.
    sign_failures: Arc<RwLock<HashSet<String>>>,
    /// Whether every signing call fails.
    fail_all_signing: Arc<RwLock<bool>>,
    /// Delay before each signing call returns.
    sign_delay: Arc<RwLock<Duration>>,
    /// Keys that were signed successfully, in order.
    signed: Arc<RwLock<Vec<String>>>,
    /// Number of signing calls started.
    sign_attempts: Arc<RwLock<usize>>,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorage {
    /// Create an empty mock bucket.
    pub fn new() -> Self {
        Self {
            keys: Arc::new(RwLock::new(Vec::new())),
            prepared: Arc::new(RwLock::new(None)),
            prepare_error: Arc::new(RwLock::new(None)),
            page_errors: Arc::new(RwLock::new(HashMap::new())),
            page_requests: Arc::new(RwLock::new(0)),
            page_delay: Arc::new(RwLock::new(Duration::ZERO)),
            sign_failures: Arc::new(RwLock::new(HashSet::new())),
            fail_all_signing: Arc::new(RwLock::new(false)),
            sign_delay: Arc::new(RwLock::new(Duration::ZERO)),
            signed: Arc::new(RwLock::new(Vec::new())),
            sign_attempts: Arc::new(RwLock::new(0)),
        }
    }

    /// Create a mock bucket holding `keys`.
    pub fn with_keys<S: AsRef<str>>(keys: &[S]) -> Self {
        let mut storage = Self::new();
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        storage.keys = Arc::new(RwLock::new(keys));
        storage
    }

    /// Replace the bucket content.
    pub async fn set_keys<S: AsRef<str>>(&self, keys: &[S]) {
        *self.keys.write().await = keys.iter().map(|k| k.as_ref().to_string()).collect();
    }

    /// Make `prepare` fail with the given error.
    pub async fn set_prepare_error(&self, error: StorageError) {
        *self.prepare_error.write().await = Some(error);
    }

    /// Make the listing page at `page_index` fail.
    pub async fn fail_page(&self, page_index: usize, error: StorageError) {
        self.page_errors.write().await.insert(page_index, error);
    }

    /// Delay every page fetch.
    pub async fn set_page_delay(&self, delay: Duration) {
        *self.page_delay.write().await = delay;
    }

    /// Make signing fail for these keys.
    pub async fn fail_signing_for<S: AsRef<str>>(&self, keys: &[S]) {
        let mut failures = self.sign_failures.write().await;
        failures.extend(keys.iter().map(|k| k.as_ref().to_string()));
    }

    /// Make every signing call fail.
    pub async fn set_fail_all_signing(&self, fail: bool) {
        *self.fail_all_signing.write().await = fail;
    }

    /// Delay every signing call.
    pub async fn set_sign_delay(&self, delay: Duration) {
        *self.sign_delay.write().await = delay;
    }

    /// Keys signed successfully, in call order.
    pub async fn signed_keys(&self) -> Vec<String> {
        self.signed.read().await.clone()
    }

    /// Number of signing calls started, failed ones included.
    pub async fn sign_attempts(&self) -> usize {
        *self.sign_attempts.read().await
    }

    /// Number of listing pages requested.
    pub async fn page_requests(&self) -> usize {
        *self.page_requests.read().await
    }

    /// Bucket passed to the last `prepare` call.
    pub async fn prepared_bucket(&self) -> Option<String> {
        self.prepared.read().await.clone()
    }

    /// URL the mock hands out for `key`.
    pub fn signed_url(bucket: &str, key: &str, ttl: Duration) -> String {
        format!(
            "https://storage.mock/{}/{}?expires={}&signature=mock",
            bucket,
            key,
            ttl.as_secs()
        )
    }

    async fn fetch_page(
        &self,
        prefix: &str,
        page_index: usize,
        page_size: usize,
    ) -> Result<(Vec<ObjectDescriptor>, bool), StorageError> {
        *self.page_requests.write().await += 1;

        let delay = *self.page_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.page_errors.read().await.get(&page_index) {
            return Err(error.clone());
        }

        let keys = self.keys.read().await;
        let matching: Vec<&String> = keys.iter().filter(|k| k.starts_with(prefix)).collect();
        let start = page_index * page_size;
        let page: Vec<ObjectDescriptor> = matching
            .iter()
            .skip(start)
            .take(page_size)
            .map(|k| ObjectDescriptor::new(k.as_str()))
            .collect();
        let has_more = start + page_size < matching.len();

        Ok((page, has_more))
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn prepare(&self, bucket: &str) -> Result<(), StorageError> {
        if let Some(error) = self.prepare_error.read().await.clone() {
            return Err(error);
        }
        *self.prepared.write().await = Some(bucket.to_string());
        Ok(())
    }

    fn list<'a>(
        &'a self,
        _bucket: &'a str,
        prefix: &'a str,
        page_size: usize,
    ) -> BoxStream<'a, Result<ObjectDescriptor, StorageError>> {
        let page_size = page_size.max(1);

        stream::try_unfold(Some(0usize), move |page_index| async move {
            let Some(page_index) = page_index else {
                return Ok(None);
            };
            let (page, has_more) = self.fetch_page(prefix, page_index, page_size).await?;
            let next = has_more.then_some(page_index + 1);
            let page = stream::iter(page.into_iter().map(Ok::<_, StorageError>));
            Ok::<_, StorageError>(Some((page, next)))
        })
        .try_flatten()
        .boxed()
    }

    async fn sign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError> {
        *self.sign_attempts.write().await += 1;

        let delay = *self.sign_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.prepared.read().await.as_deref() != Some(bucket) {
            return Err(StorageError::NotPrepared);
        }

        if *self.fail_all_signing.read().await || self.sign_failures.read().await.contains(key) {
            return Err(StorageError::Signing {
                key: key.to_string(),
                message: "access denied".to_string(),
            });
        }

        self.signed.write().await.push(key.to_string());
        Ok(Self::signed_url(bucket, key, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pages_follow_page_size() {
        let storage = MockStorage::with_keys(&["1", "2", "3", "4", "5"]);
        let keys: Vec<String> = storage
            .list("bucket", "", 2)
            .map(|item| item.unwrap().key)
            .collect()
            .await;

        assert_eq!(keys, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(storage.page_requests().await, 3);
    }

    #[tokio::test]
    async fn test_prefix_filters_keys() {
        let storage = MockStorage::with_keys(&["a/1.jpg", "b/2.jpg", "a/3.jpg"]);
        let keys: Vec<String> = storage
            .list("bucket", "a/", 10)
            .map(|item| item.unwrap().key)
            .collect()
            .await;

        assert_eq!(keys, vec!["a/1.jpg", "a/3.jpg"]);
    }

    #[tokio::test]
    async fn test_sign_requires_prepare() {
        let storage = MockStorage::with_keys(&["a.jpg"]);
        let ttl = Duration::from_secs(60);
        assert!(matches!(
            storage.sign("bucket", "a.jpg", ttl).await,
            Err(StorageError::NotPrepared)
        ));

        storage.prepare("bucket").await.unwrap();
        let url = storage.sign("bucket", "a.jpg", ttl).await.unwrap();
        assert_eq!(url, MockStorage::signed_url("bucket", "a.jpg", ttl));
        assert_eq!(storage.signed_keys().await, vec!["a.jpg"]);
        assert_eq!(storage.sign_attempts().await, 2);
    }
}
