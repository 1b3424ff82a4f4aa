//! Consumer stage: hands each signed URL to the ingestion API.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hasty::{ExternalImageRequest, HastyError, IngestionClient};

use super::config::PipelineSettings;
use super::target::ImportTarget;
use super::types::{AbortReason, ErrorBudget, TransferDescriptor};

/// Drains the queue and submits every descriptor once.
pub struct Importer {
    client: Arc<dyn IngestionClient>,
    project_id: String,
    dataset_id: String,
    copy_files: bool,
    submit_timeout: Duration,
    error_limit: u32,
}

impl Importer {
    pub fn new(
        client: Arc<dyn IngestionClient>,
        target: &ImportTarget,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            client,
            project_id: target.project_id.clone(),
            dataset_id: target.dataset_id.clone(),
            copy_files: settings.copy_files,
            submit_timeout: settings.submit_timeout,
            error_limit: settings.max_consecutive_errors,
        }
    }

    /// Consume until the queue is closed and empty.
    ///
    /// When the error budget trips the run is cancelled and the stage returns
    /// at once; the receiver is dropped with it so a blocked lister wakes up.
    pub async fn run(
        self,
        mut queue: mpsc::Receiver<TransferDescriptor>,
        cancel: CancellationToken,
    ) -> Result<(), AbortReason> {
        let mut budget = ErrorBudget::new(self.error_limit);
        let mut submitted: u64 = 0;
        let mut failed: u64 = 0;

        loop {
            let descriptor = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(submitted, failed, "Import cancelled");
                    return Err(AbortReason::Cancelled);
                }
                next = queue.recv() => match next {
                    Some(descriptor) => descriptor,
                    None => break,
                },
            };

            match self.submit(&descriptor, &cancel).await {
                Ok(()) => {
                    budget.record_success();
                    submitted += 1;
                    debug!(path = %descriptor.source_path(), "File imported");
                }
                Err(HastyError::Cancelled) => {
                    debug!(submitted, failed, "Import cancelled");
                    return Err(AbortReason::Cancelled);
                }
                Err(e) => {
                    failed += 1;
                    warn!(path = %descriptor.source_path(), error = %e, "Unable to import file");
                    if budget.record_failure() {
                        error!(
                            errors = budget.count(),
                            limit = budget.limit(),
                            "Too many import errors happened one by one, giving up import"
                        );
                        cancel.cancel();
                        return Err(AbortReason::SubmissionBreakerTripped {
                            failures: budget.count(),
                        });
                    }
                }
            }
        }

        info!(submitted, failed, "Import is done");
        Ok(())
    }

    /// One submission bounded by the per-call timeout and the run's
    /// cancellation.
    async fn submit(
        &self,
        descriptor: &TransferDescriptor,
        cancel: &CancellationToken,
    ) -> Result<(), HastyError> {
        let request = ExternalImageRequest {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
            url: descriptor.url().to_string(),
            filename: descriptor.filename().to_string(),
            copy: self.copy_files,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HastyError::Cancelled),
            result = tokio::time::timeout(
                self.submit_timeout,
                self.client.submit_external_image(&request),
            ) => match result {
                Ok(result) => result.map(|_| ()),
                Err(_) => Err(HastyError::Timeout(self.submit_timeout)),
            },
        }
    }
}
