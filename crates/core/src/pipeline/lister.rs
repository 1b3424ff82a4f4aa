//! Producer stage: lists the bucket and signs a URL per object.

use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::storage::{ObjectStorage, StorageError};

use super::config::PipelineSettings;
use super::types::{AbortReason, ErrorBudget, TransferDescriptor};

/// Lists a bucket and publishes one `TransferDescriptor` per file.
pub struct Lister {
    storage: Arc<dyn ObjectStorage>,
    page_size: usize,
    sign_ttl: Duration,
    storage_timeout: Duration,
    error_limit: u32,
}

/// Per-run counters, logged when the stage ends.
#[derive(Debug, Default)]
struct ListerStats {
    listed: u64,
    directories: u64,
    published: u64,
    sign_failures: u64,
}

impl Lister {
    pub fn new(storage: Arc<dyn ObjectStorage>, settings: &PipelineSettings) -> Self {
        Self {
            storage,
            page_size: settings.page_size,
            sign_ttl: settings.sign_ttl,
            storage_timeout: settings.storage_timeout,
            error_limit: settings.max_consecutive_errors,
        }
    }

    /// Run the stage to completion.
    ///
    /// The queue is closed on every exit path. Fatal conditions also cancel
    /// `cancel` so the importer stops without draining what is buffered.
    pub async fn run(
        self,
        bucket: String,
        prefix: String,
        queue: mpsc::Sender<TransferDescriptor>,
        cancel: CancellationToken,
    ) -> Result<(), AbortReason> {
        let mut stats = ListerStats::default();
        let result = self
            .list_and_sign(&bucket, &prefix, &queue, &cancel, &mut stats)
            .await;
        drop(queue);

        debug!(
            listed = stats.listed,
            directories = stats.directories,
            published = stats.published,
            sign_failures = stats.sign_failures,
            "Listing stage finished"
        );

        match &result {
            Ok(()) => info!(bucket = %bucket, "Listing is done"),
            Err(AbortReason::Cancelled) => debug!("Listing cancelled"),
            Err(reason) => {
                error!(bucket = %bucket, reason = %reason, "Listing aborted");
                cancel.cancel();
            }
        }
        result
    }

    async fn list_and_sign(
        &self,
        bucket: &str,
        prefix: &str,
        queue: &mpsc::Sender<TransferDescriptor>,
        cancel: &CancellationToken,
        stats: &mut ListerStats,
    ) -> Result<(), AbortReason> {
        debug!(storage = self.storage.name(), bucket = bucket, "Prepare storage client");
        match self.bounded(cancel, self.storage.prepare(bucket)).await? {
            Ok(()) => {}
            Err(e) => return Err(AbortReason::StorageSetup(e.to_string())),
        }

        debug!(bucket = bucket, prefix = prefix, "Listing objects in bucket");
        let mut listing = self.storage.list(bucket, prefix, self.page_size);
        let mut budget = ErrorBudget::new(self.error_limit);

        loop {
            let object = match self.bounded(cancel, listing.next()).await {
                Err(reason) => return Err(reason),
                Ok(None) => return Ok(()),
                Ok(Some(Ok(object))) => object,
                Ok(Some(Err(e))) => return Err(AbortReason::ListingFailed(e.to_string())),
            };
            stats.listed += 1;

            if object.is_directory_marker {
                info!(key = %object.key, "Skip directory");
                stats.directories += 1;
                continue;
            }

            info!(key = %object.key, "Process object");
            let signed = self
                .bounded(cancel, self.storage.sign(bucket, &object.key, self.sign_ttl))
                .await?;
            let url = match signed {
                Ok(url) => {
                    budget.record_success();
                    url
                }
                Err(e) => {
                    stats.sign_failures += 1;
                    warn!(key = %object.key, error = %e, "Unable to get signed link for file");
                    if budget.record_failure() {
                        error!(
                            errors = budget.count(),
                            limit = budget.limit(),
                            "Too many signing errors happened one by one, giving up import"
                        );
                        return Err(AbortReason::SigningBreakerTripped {
                            failures: budget.count(),
                        });
                    }
                    continue;
                }
            };

            let descriptor = TransferDescriptor::new(url, object.key);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AbortReason::Cancelled),
                sent = queue.send(descriptor) => {
                    if sent.is_err() {
                        debug!("Importer stopped receiving");
                        return Err(AbortReason::Cancelled);
                    }
                    stats.published += 1;
                }
            }
        }
    }

    /// Await a storage call under the storage timeout and the run's
    /// cancellation. A timeout is reported as `StorageError::Timeout`.
    async fn bounded<T, F>(
        &self,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, AbortReason>
    where
        F: Future<Output = T>,
        T: TimeoutFallback,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AbortReason::Cancelled),
            result = tokio::time::timeout(self.storage_timeout, call) => {
                Ok(result.unwrap_or_else(|_| T::timed_out()))
            }
        }
    }
}

/// Value standing in for a storage call that hit its timeout.
trait TimeoutFallback {
    fn timed_out() -> Self;
}

impl<T> TimeoutFallback for Result<T, StorageError> {
    fn timed_out() -> Self {
        Err(StorageError::Timeout)
    }
}

impl<T> TimeoutFallback for Option<Result<T, StorageError>> {
    fn timed_out() -> Self {
        Some(Err(StorageError::Timeout))
    }
}
