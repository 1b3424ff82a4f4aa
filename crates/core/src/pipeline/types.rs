//! Types flowing through the import pipeline.

use std::fmt;

use crate::storage::KEY_SEPARATOR;

/// One object ready to be imported.
///
/// Built by the lister once the object's URL is signed and consumed exactly
/// once by the importer. Fields are read-only after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    url: String,
    source_path: String,
    filename: String,
}

impl TransferDescriptor {
    pub fn new(url: impl Into<String>, source_path: impl Into<String>) -> Self {
        let source_path = source_path.into();
        let filename = base_name(&source_path).to_string();
        Self {
            url: url.into(),
            source_path,
            filename,
        }
    }

    /// Signed download URL. Never log it.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Full key of the object in the source bucket.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Last segment of the key, used as the file name in the dataset.
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl fmt::Debug for TransferDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferDescriptor")
            .field("url", &"<redacted>")
            .field("source_path", &self.source_path)
            .field("filename", &self.filename)
            .finish()
    }
}

/// Last path segment of an object key.
pub fn base_name(key: &str) -> &str {
    let trimmed = key.trim_end_matches(KEY_SEPARATOR);
    match trimmed.rfind(KEY_SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Consecutive-failure counter owned by one stage.
///
/// Any success resets it; the stage gives up on the failure that takes the
/// count past `limit`.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    count: u32,
    limit: u32,
}

impl ErrorBudget {
    pub fn new(limit: u32) -> Self {
        Self { count: 0, limit }
    }

    pub fn record_success(&mut self) {
        self.count = 0;
    }

    /// Count a failure and report whether the breaker tripped.
    pub fn record_failure(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.is_tripped()
    }

    pub fn is_tripped(&self) -> bool {
        self.count > self.limit
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// Why a run ended without importing everything.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    /// Credential or region resolution failed before listing.
    #[error("storage setup failed: {0}")]
    StorageSetup(String),

    /// The listing call itself failed.
    #[error("listing failed: {0}")]
    ListingFailed(String),

    /// Too many signing failures in a row.
    #[error("{failures} consecutive signing failures")]
    SigningBreakerTripped { failures: u32 },

    /// Too many submission failures in a row.
    #[error("{failures} consecutive import failures")]
    SubmissionBreakerTripped { failures: u32 },

    /// The run was cancelled from outside.
    #[error("cancelled")]
    Cancelled,

    /// A stage task panicked or was aborted.
    #[error("stage failed: {0}")]
    StageFailed(String),
}

/// Terminal result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The listing was exhausted and every descriptor was handled.
    Completed,
    Aborted(AbortReason),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Lifecycle of a pipeline run. Terminal states are absorbing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted(AbortReason),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted(_))
    }
}

impl From<RunOutcome> for RunState {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => RunState::Completed,
            RunOutcome::Aborted(reason) => RunState::Aborted(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a/img1.jpg"), "img1.jpg");
        assert_eq!(base_name("a/b/c/img2.png"), "img2.png");
        assert_eq!(base_name("img3.jpg"), "img3.jpg");
        assert_eq!(base_name("a/b/"), "b");
    }

    #[test]
    fn test_descriptor_derives_filename() {
        let descriptor = TransferDescriptor::new("https://signed", "photos/2024/cat.jpg");
        assert_eq!(descriptor.source_path(), "photos/2024/cat.jpg");
        assert_eq!(descriptor.filename(), "cat.jpg");
        assert_eq!(descriptor.url(), "https://signed");
    }

    #[test]
    fn test_descriptor_debug_hides_url() {
        let descriptor = TransferDescriptor::new("https://signed?token=secret", "a/b.jpg");
        let debug = format!("{:?}", descriptor);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("a/b.jpg"));
    }

    #[test]
    fn test_error_budget_trips_after_limit() {
        let mut budget = ErrorBudget::new(3);
        assert!(!budget.record_failure());
        assert!(!budget.record_failure());
        assert!(!budget.record_failure());
        assert_eq!(budget.count(), 3);
        assert!(budget.record_failure());
        assert!(budget.is_tripped());
    }

    #[test]
    fn test_error_budget_reset_on_success() {
        let mut budget = ErrorBudget::new(2);
        budget.record_failure();
        budget.record_failure();
        budget.record_success();
        assert_eq!(budget.count(), 0);
        assert!(!budget.record_failure());
        assert!(!budget.record_failure());
        assert!(!budget.is_tripped());
        assert!(budget.record_failure());
    }

    #[test]
    fn test_run_state_from_outcome() {
        assert_eq!(RunState::from(RunOutcome::Completed), RunState::Completed);
        let state = RunState::from(RunOutcome::Aborted(AbortReason::Cancelled));
        assert!(state.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }
}
