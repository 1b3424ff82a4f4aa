//! Import pipeline integration tests.
//!
//! These tests run whole imports against mock storage and a mock ingestion
//! client:
//! - Ordered submission of every listed file
//! - Folder placeholders skipped without counting as errors
//! - Per-stage error budgets and their reset on success
//! - Timeouts, cancellation and queue shutdown without deadlock
//! - Run state transitions

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use hasty_core::{
    pipeline::{AbortReason, ImportPipeline, PipelineSettings, RunOutcome, RunState},
    storage::StorageError,
    testing::{fixtures, MockIngestionClient, MockStorage},
};

/// Upper bound for any run in these tests.
const RUN_DEADLINE: Duration = Duration::from_secs(5);

/// Test helper wiring mocks into a pipeline.
struct TestHarness {
    storage: Arc<MockStorage>,
    client: Arc<MockIngestionClient>,
    settings: PipelineSettings,
}

impl TestHarness {
    fn new<S: AsRef<str>>(keys: &[S]) -> Self {
        Self {
            storage: Arc::new(MockStorage::with_keys(keys)),
            client: Arc::new(MockIngestionClient::new()),
            settings: PipelineSettings::default()
                .with_page_size(5)
                .with_submit_timeout(Duration::from_millis(200))
                .with_storage_timeout(Duration::from_millis(500)),
        }
    }

    fn with_settings(mut self, f: impl FnOnce(PipelineSettings) -> PipelineSettings) -> Self {
        self.settings = f(self.settings);
        self
    }

    fn pipeline(&self) -> ImportPipeline {
        ImportPipeline::new(
            self.storage.clone(),
            self.client.clone(),
            self.settings.clone(),
        )
    }

    async fn run(&self, prefix: &str) -> RunOutcome {
        self.run_with(prefix, &CancellationToken::new()).await
    }

    async fn run_with(&self, prefix: &str, shutdown: &CancellationToken) -> RunOutcome {
        let target = fixtures::target("bucket", prefix);
        tokio::time::timeout(RUN_DEADLINE, self.pipeline().execute(&target, shutdown))
            .await
            .expect("pipeline run did not finish")
    }
}

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn test_every_file_submitted_in_listing_order() {
    let keys = fixtures::image_keys("photos/", 23);
    let harness = TestHarness::new(&keys);

    let outcome = harness.run("").await;
    assert_eq!(outcome, RunOutcome::Completed);

    let expected: Vec<String> = (1..=23).map(|i| format!("img{:03}.jpg", i)).collect();
    assert_eq!(harness.client.imported_filenames().await, expected);
    assert_eq!(harness.client.submission_count().await, 23);
}

#[tokio::test]
async fn test_folder_with_placeholder() {
    let harness = TestHarness::new(&["a/", "a/img1.jpg", "a/img2.png"]);

    let outcome = harness.run("a/").await;
    assert_eq!(outcome, RunOutcome::Completed);

    let submissions = harness.client.recorded_submissions().await;
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].request.filename, "img1.jpg");
    assert_eq!(submissions[1].request.filename, "img2.png");
    assert_eq!(
        submissions[0].request.url,
        MockStorage::signed_url("bucket", "a/img1.jpg", harness.settings.sign_ttl)
    );
    assert!(submissions.iter().all(|s| s.request.copy));
    assert!(submissions
        .iter()
        .all(|s| s.request.dataset_id == fixtures::DATASET_ID));

    // The placeholder never reaches the signer
    assert_eq!(harness.storage.sign_attempts().await, 2);
}

#[tokio::test]
async fn test_prefix_matching_file_names() {
    let harness = TestHarness::new(&[
        "folder/DCS_001.jpg",
        "folder/DCS_002.jpg",
        "folder/IMG_001.jpg",
        "other/DCS_003.jpg",
    ]);

    let outcome = harness.run("folder/DCS_").await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(
        harness.client.imported_filenames().await,
        vec!["DCS_001.jpg", "DCS_002.jpg"]
    );
}

#[tokio::test]
async fn test_empty_bucket_completes() {
    let harness = TestHarness::new::<&str>(&[]);

    let outcome = harness.run("").await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(harness.client.submission_count().await, 0);
    assert_eq!(harness.storage.page_requests().await, 1);
}

#[tokio::test]
async fn test_only_placeholders_is_not_an_error() {
    let placeholders: Vec<String> = (0..30).map(|i| format!("dir{}/", i)).collect();
    let harness = TestHarness::new(&placeholders).with_settings(|s| s.with_max_consecutive_errors(2));

    let outcome = harness.run("").await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(harness.storage.sign_attempts().await, 0);
}

#[tokio::test]
async fn test_copy_flag_is_forwarded() {
    let mut harness = TestHarness::new(&["a.jpg"]);
    harness.settings.copy_files = false;

    harness.run("").await;
    let submissions = harness.client.recorded_submissions().await;
    assert!(!submissions[0].request.copy);
}

// =============================================================================
// Signing Errors
// =============================================================================

#[tokio::test]
async fn test_signing_breaker_aborts_without_further_listing() {
    let keys = fixtures::image_keys("", 20);
    let harness = TestHarness::new(&keys).with_settings(|s| s.with_max_consecutive_errors(10));
    harness.storage.set_fail_all_signing(true).await;

    let outcome = harness.run("").await;
    assert_eq!(
        outcome,
        RunOutcome::Aborted(AbortReason::SigningBreakerTripped { failures: 11 })
    );
    assert_eq!(harness.storage.sign_attempts().await, 11);
    assert_eq!(harness.client.submission_count().await, 0);
    // Pages of 5: the 11th failure is on the third page, the fourth is never fetched
    assert_eq!(harness.storage.page_requests().await, 3);
}

#[tokio::test]
async fn test_signing_failures_below_limit_are_skipped() {
    let keys = fixtures::image_keys("", 6);
    let harness = TestHarness::new(&keys).with_settings(|s| s.with_max_consecutive_errors(10));
    harness
        .storage
        .fail_signing_for(&["img002.jpg", "img005.jpg"])
        .await;

    let outcome = harness.run("").await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(
        harness.client.imported_filenames().await,
        vec!["img001.jpg", "img003.jpg", "img004.jpg", "img006.jpg"]
    );
}

#[tokio::test]
async fn test_signing_success_resets_budget() {
    let keys = fixtures::image_keys("", 21);
    let harness = TestHarness::new(&keys).with_settings(|s| s.with_max_consecutive_errors(10));

    // Ten failures, one success, ten failures
    let failing: Vec<&String> = keys
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 10)
        .map(|(_, k)| k)
        .collect();
    harness.storage.fail_signing_for(&failing).await;

    let outcome = harness.run("").await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(harness.client.imported_filenames().await, vec!["img011.jpg"]);
}

#[tokio::test]
async fn test_slow_signing_counts_as_failure() {
    let harness = TestHarness::new(&["a.jpg", "b.jpg"])
        .with_settings(|s| s.with_storage_timeout(Duration::from_millis(50)));
    harness.storage.set_sign_delay(Duration::from_secs(10)).await;

    let outcome = harness.run("").await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(harness.client.submission_count().await, 0);
    assert_eq!(harness.storage.sign_attempts().await, 2);
}

// =============================================================================
// Listing Errors
// =============================================================================

#[tokio::test]
async fn test_prepare_failure_aborts_run() {
    let harness = TestHarness::new(&["a.jpg"]);
    harness
        .storage
        .set_prepare_error(StorageError::Setup("bucket location unavailable".into()))
        .await;

    let outcome = harness.run("").await;
    assert!(matches!(
        outcome,
        RunOutcome::Aborted(AbortReason::StorageSetup(_))
    ));
    assert_eq!(harness.storage.page_requests().await, 0);
    assert_eq!(harness.client.submission_count().await, 0);
}

#[tokio::test]
async fn test_listing_failure_aborts_run() {
    let keys = fixtures::image_keys("", 12);
    let harness = TestHarness::new(&keys);
    harness
        .storage
        .fail_page(1, StorageError::Listing("throttled".into()))
        .await;

    let outcome = harness.run("").await;
    assert!(matches!(
        outcome,
        RunOutcome::Aborted(AbortReason::ListingFailed(_))
    ));
    assert_eq!(harness.storage.page_requests().await, 2);
}

// =============================================================================
// Submission Errors
// =============================================================================

#[tokio::test]
async fn test_submission_timeout_drops_item() {
    let keys = fixtures::image_keys("", 5);
    let harness = TestHarness::new(&keys)
        .with_settings(|s| s.with_submit_timeout(Duration::from_millis(100)));
    harness
        .client
        .set_delay_for("img003.jpg", Duration::from_secs(10))
        .await;

    let outcome = harness.run("").await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(
        harness.client.imported_filenames().await,
        vec!["img001.jpg", "img002.jpg", "img004.jpg", "img005.jpg"]
    );
    assert_eq!(harness.client.attempted_filenames().await.len(), 5);
}

#[tokio::test]
async fn test_submission_breaker_aborts_run() {
    let keys = fixtures::image_keys("", 40);
    let harness = TestHarness::new(&keys).with_settings(|s| {
        s.with_max_consecutive_errors(3).with_queue_capacity(2)
    });
    harness.client.set_fail_all(true).await;

    let outcome = harness.run("").await;
    assert_eq!(
        outcome,
        RunOutcome::Aborted(AbortReason::SubmissionBreakerTripped { failures: 4 })
    );
    assert_eq!(harness.client.submission_count().await, 4);
    // The lister stopped long before the end of the bucket
    assert!(harness.storage.sign_attempts().await < 40);
}

#[tokio::test]
async fn test_submission_success_resets_budget() {
    let keys = fixtures::image_keys("", 7);
    let harness = TestHarness::new(&keys).with_settings(|s| s.with_max_consecutive_errors(3));
    harness
        .client
        .fail_filenames(&["img001.jpg", "img002.jpg", "img003.jpg", "img005.jpg", "img006.jpg", "img007.jpg"])
        .await;

    let outcome = harness.run("").await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(harness.client.imported_filenames().await, vec!["img004.jpg"]);
    assert_eq!(harness.client.submission_count().await, 7);
}

#[tokio::test]
async fn test_budgets_are_per_stage() {
    // Signing failures followed by submission failures, each below the limit
    let keys = fixtures::image_keys("", 6);
    let harness = TestHarness::new(&keys).with_settings(|s| s.with_max_consecutive_errors(3));
    harness
        .storage
        .fail_signing_for(&["img001.jpg", "img002.jpg", "img003.jpg"])
        .await;
    harness
        .client
        .fail_filenames(&["img004.jpg", "img005.jpg", "img006.jpg"])
        .await;

    let outcome = harness.run("").await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert!(harness.client.imported_filenames().await.is_empty());
}

// =============================================================================
// Back-Pressure and Cancellation
// =============================================================================

#[tokio::test]
async fn test_slow_importer_with_small_queue_drains() {
    let keys = fixtures::image_keys("", 12);
    let harness = TestHarness::new(&keys).with_settings(|s| s.with_queue_capacity(1));
    harness.client.set_submit_delay(Duration::from_millis(5)).await;

    let outcome = harness.run("").await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(harness.client.imported_filenames().await.len(), 12);
}

#[tokio::test]
async fn test_external_cancel_stops_blocked_lister() {
    let keys = fixtures::image_keys("", 50);
    let harness = TestHarness::new(&keys).with_settings(|s| {
        s.with_queue_capacity(1)
            .with_submit_timeout(Duration::from_secs(60))
    });
    // The importer is stuck on the first item, the lister fills the queue
    harness.client.set_submit_delay(Duration::from_secs(30)).await;

    let shutdown = CancellationToken::new();
    let canceller = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = tokio::time::Instant::now();
    let outcome = harness.run_with("", &shutdown).await;
    assert_eq!(outcome, RunOutcome::Aborted(AbortReason::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(harness.storage.sign_attempts().await < 50);
    assert_eq!(harness.client.submission_count().await, 0);
}

#[tokio::test]
async fn test_cancel_during_slow_listing() {
    let harness = TestHarness::new(&["a.jpg"])
        .with_settings(|s| s.with_storage_timeout(Duration::from_secs(60)));
    harness.storage.set_page_delay(Duration::from_secs(30)).await;

    let shutdown = CancellationToken::new();
    let canceller = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let outcome = harness.run_with("", &shutdown).await;
    assert_eq!(outcome, RunOutcome::Aborted(AbortReason::Cancelled));
}

#[tokio::test]
async fn test_stage_failure_does_not_cancel_caller_token() {
    let harness = TestHarness::new(&["a.jpg"]);
    harness
        .storage
        .set_prepare_error(StorageError::Setup("denied".into()))
        .await;

    let shutdown = CancellationToken::new();
    harness.run_with("", &shutdown).await;
    assert!(!shutdown.is_cancelled());
}

// =============================================================================
// Run State
// =============================================================================

#[tokio::test]
async fn test_run_state_transitions() {
    let harness = TestHarness::new(&["a.jpg", "b.jpg"]);
    harness.client.set_submit_delay(Duration::from_millis(50)).await;

    let pipeline = harness.pipeline();
    let mut states = pipeline.subscribe();
    assert_eq!(*states.borrow(), RunState::Idle);

    // Runs until the pipeline is dropped with its sender
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        while states.changed().await.is_ok() {
            seen.push(states.borrow_and_update().clone());
        }
        seen
    });

    let target = fixtures::target("bucket", "");
    let outcome = tokio::time::timeout(
        RUN_DEADLINE,
        pipeline.execute(&target, &CancellationToken::new()),
    )
    .await
    .expect("pipeline run did not finish");
    assert_eq!(outcome, RunOutcome::Completed);

    // A watch receiver only sees the latest value, Running may be folded into Completed
    let seen = collector.await.unwrap();
    assert_eq!(seen.last(), Some(&RunState::Completed));
    assert!(seen
        .iter()
        .all(|s| matches!(s, RunState::Running | RunState::Completed)));
    assert_eq!(seen.iter().filter(|s| s.is_terminal()).count(), 1);
}

#[tokio::test]
async fn test_state_is_running_while_submission_in_flight() {
    let harness = TestHarness::new(&["a.jpg"])
        .with_settings(|s| s.with_submit_timeout(Duration::from_secs(30)));
    harness.client.set_submit_delay(Duration::from_secs(30)).await;

    let pipeline = harness.pipeline();
    let mut states = pipeline.subscribe();
    let shutdown = CancellationToken::new();
    let target = fixtures::target("bucket", "");
    let run = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { pipeline.execute(&target, &shutdown).await }
    });

    // The only submission blocks until cancelled, so Running is held
    tokio::time::timeout(RUN_DEADLINE, states.wait_for(|s| *s == RunState::Running))
        .await
        .expect("pipeline never reported Running")
        .unwrap();

    shutdown.cancel();
    let outcome = tokio::time::timeout(RUN_DEADLINE, run)
        .await
        .expect("pipeline run did not finish")
        .unwrap();
    assert_eq!(outcome, RunOutcome::Aborted(AbortReason::Cancelled));
}

#[tokio::test]
async fn test_aborted_state_carries_reason() {
    let harness = TestHarness::new(&["a.jpg"]);
    harness
        .storage
        .set_prepare_error(StorageError::Setup("denied".into()))
        .await;

    let pipeline = harness.pipeline();
    let states = pipeline.subscribe();
    pipeline
        .execute(&fixtures::target("bucket", ""), &CancellationToken::new())
        .await;

    assert!(matches!(
        *states.borrow(),
        RunState::Aborted(AbortReason::StorageSetup(_))
    ));
}
