//! Mock ingestion client for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::hasty::{Dataset, ExternalImage, ExternalImageRequest, HastyError, IngestionClient};

/// A recorded submission for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    /// The request that was made.
    pub request: ExternalImageRequest,
    /// Whether the submission succeeded.
    pub success: bool,
}

/// Mock implementation of the IngestionClient trait.
///
/// Submissions are recorded when they complete. A call abandoned by the
/// caller (timeout, cancellation) only shows up in `attempted_filenames`.
///
/// # Example
///
/// ```rust,ignore
/// use hasty_core::testing::MockIngestionClient;
///
/// let client = MockIngestionClient::new();
/// client.fail_filenames(&["broken.jpg"]).await;
///
/// // Run a pipeline with it...
///
/// let submissions = client.recorded_submissions().await;
/// assert!(submissions.iter().all(|s| s.success || s.request.filename == "broken.jpg"));
/// ```
#[derive(Debug)]
pub struct MockIngestionClient {
    /// Completed submissions, in completion order.
    submissions: Arc<RwLock<Vec<RecordedSubmission>>>,
    /// File names of every call, in call order.
    attempts: Arc<RwLock<Vec<String>>>,
    /// File names whose submission fails.
    failing: Arc<RwLock<HashSet<String>>>,
    /// Whether every submission fails.
    fail_all: Arc<RwLock<bool>>,
    /// Delay applied to every submission.
    submit_delay: Arc<RwLock<Duration>>,
    /// Delays for specific file names, replacing `submit_delay`.
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    /// Datasets created through the mock.
    datasets: Arc<RwLock<Vec<Dataset>>>,
}

impl Default for MockIngestionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIngestionClient {
    /// Create a mock that accepts every submission.
    pub fn new() -> Self {
        Self {
            submissions: Arc::new(RwLock::new(Vec::new())),
            attempts: Arc::new(RwLock::new(Vec::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
            fail_all: Arc::new(RwLock::new(false)),
            submit_delay: Arc::new(RwLock::new(Duration::ZERO)),
            delays: Arc::new(RwLock::new(HashMap::new())),
            datasets: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get all completed submissions.
    pub async fn recorded_submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.read().await.clone()
    }

    /// Get the number of completed submissions.
    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }

    /// File names of successful submissions, in order.
    pub async fn imported_filenames(&self) -> Vec<String> {
        self.submissions
            .read()
            .await
            .iter()
            .filter(|s| s.success)
            .map(|s| s.request.filename.clone())
            .collect()
    }

    /// File names of every call made, completed or not.
    pub async fn attempted_filenames(&self) -> Vec<String> {
        self.attempts.read().await.clone()
    }

    /// Make submissions of these file names fail.
    pub async fn fail_filenames<S: AsRef<str>>(&self, filenames: &[S]) {
        let mut failing = self.failing.write().await;
        failing.extend(filenames.iter().map(|f| f.as_ref().to_string()));
    }

    /// Make every submission fail.
    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    /// Delay every submission.
    pub async fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.write().await = delay;
    }

    /// Delay the submission of one file name.
    pub async fn set_delay_for(&self, filename: &str, delay: Duration) {
        self.delays.write().await.insert(filename.to_string(), delay);
    }

    /// Get datasets created through the mock.
    pub async fn created_datasets(&self) -> Vec<Dataset> {
        self.datasets.read().await.clone()
    }
}

#[async_trait]
impl IngestionClient for MockIngestionClient {
    async fn submit_external_image(
        &self,
        request: &ExternalImageRequest,
    ) -> Result<ExternalImage, HastyError> {
        self.attempts.write().await.push(request.filename.clone());

        let delay = match self.delays.read().await.get(&request.filename) {
            Some(delay) => *delay,
            None => *self.submit_delay.read().await,
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let fail = *self.fail_all.read().await
            || self.failing.read().await.contains(&request.filename);

        self.submissions.write().await.push(RecordedSubmission {
            request: request.clone(),
            success: !fail,
        });

        if fail {
            return Err(HastyError::Api {
                status: 500,
                message: "mock submission failure".to_string(),
            });
        }

        Ok(ExternalImage {
            id: Uuid::new_v4().to_string(),
            dataset_id: Some(request.dataset_id.clone()),
            name: Some(request.filename.clone()),
            status: Some("NEW".to_string()),
        })
    }

    async fn create_dataset(&self, _project_id: &str, name: &str) -> Result<Dataset, HastyError> {
        let dataset = Dataset {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            norder: None,
        };
        self.datasets.write().await.push(dataset.clone());
        Ok(dataset)
    }
}
