//! Runtime settings of the import pipeline.

use std::time::Duration;

use crate::config::ImportConfig;

/// Settings shared by the lister, the importer and the controller.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Capacity of the queue between the two stages.
    pub queue_capacity: usize,
    /// Objects requested per listing page.
    pub page_size: usize,
    /// Lifetime of signed URLs.
    pub sign_ttl: Duration,
    /// Bound on each listing page fetch and signing call.
    pub storage_timeout: Duration,
    /// Bound on each submission call.
    pub submit_timeout: Duration,
    /// Consecutive failures each stage tolerates.
    pub max_consecutive_errors: u32,
    /// `copy` flag of the ingestion call.
    pub copy_files: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for PipelineSettings {
    fn from(config: &ImportConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            page_size: config.page_size,
            sign_ttl: config.sign_ttl(),
            storage_timeout: config.storage_timeout(),
            submit_timeout: config.submit_timeout(),
            max_consecutive_errors: config.max_consecutive_errors,
            copy_files: config.copy_files,
        }
    }
}

impl PipelineSettings {
    /// Sets the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the listing page size. Pages hold at least one object.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sets the consecutive error limit of both stages.
    pub fn with_max_consecutive_errors(mut self, limit: u32) -> Self {
        self.max_consecutive_errors = limit;
        self
    }

    /// Sets the per-submission timeout.
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Sets the per-call storage timeout.
    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }
}
