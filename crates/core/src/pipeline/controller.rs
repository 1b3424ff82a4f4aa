//! Runs the two stages of one import and resolves its outcome.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::hasty::IngestionClient;
use crate::storage::ObjectStorage;

use super::config::PipelineSettings;
use super::importer::Importer;
use super::lister::Lister;
use super::target::ImportTarget;
use super::types::{AbortReason, RunOutcome, RunState};

/// A single-use import run.
///
/// `execute` consumes the pipeline, so a run that reached a terminal state
/// cannot be restarted. Build a new pipeline for the next run.
pub struct ImportPipeline {
    storage: Arc<dyn ObjectStorage>,
    client: Arc<dyn IngestionClient>,
    settings: PipelineSettings,
    state: watch::Sender<RunState>,
}

impl ImportPipeline {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        client: Arc<dyn IngestionClient>,
        settings: PipelineSettings,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            storage,
            client,
            settings,
            state,
        }
    }

    /// Observe state transitions of this run.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    /// Run the import to its end.
    ///
    /// Cancelling `shutdown` stops both stages promptly; buffered descriptors
    /// are dropped. The run's own scope is a child of `shutdown`, so a stage
    /// giving up never cancels the caller's token.
    pub async fn execute(self, target: &ImportTarget, shutdown: &CancellationToken) -> RunOutcome {
        let run_scope = shutdown.child_token();
        self.state.send_replace(RunState::Running);
        info!(
            storage = self.storage.name(),
            bucket = %target.bucket,
            prefix = %target.prefix,
            dataset_id = %target.dataset_id,
            "Import started"
        );

        let (queue_tx, queue_rx) = mpsc::channel(self.settings.queue_capacity.max(1));

        let lister = Lister::new(self.storage.clone(), &self.settings);
        let lister_handle: JoinHandle<Result<(), AbortReason>> = tokio::spawn(lister.run(
            target.bucket.clone(),
            target.prefix.clone(),
            queue_tx,
            run_scope.clone(),
        ));

        let importer = Importer::new(self.client.clone(), target, &self.settings);
        let importer_scope = run_scope.clone();
        let importer_handle: JoinHandle<Result<(), AbortReason>> = tokio::spawn(async move {
            // The run is over once the consumer is, panics included
            let _scope_guard = importer_scope.clone().drop_guard();
            importer.run(queue_rx, importer_scope).await
        });

        run_scope.cancelled().await;

        let lister_result = flatten(lister_handle.await);
        let importer_result = flatten(importer_handle.await);
        let outcome = resolve_outcome(lister_result, importer_result);

        match &outcome {
            RunOutcome::Completed => info!(bucket = %target.bucket, "Import completed"),
            RunOutcome::Aborted(AbortReason::Cancelled) => {
                warn!(bucket = %target.bucket, "Import cancelled")
            }
            RunOutcome::Aborted(reason) => {
                error!(bucket = %target.bucket, reason = %reason, "Import aborted")
            }
        }

        self.state.send_replace(RunState::from(outcome.clone()));
        outcome
    }
}

fn flatten(joined: Result<Result<(), AbortReason>, JoinError>) -> Result<(), AbortReason> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(AbortReason::StageFailed(e.to_string())),
    }
}

/// Pick the reason that best explains how the run ended.
///
/// A stage that gave up is reported over the `Cancelled` the other stage
/// saw as a consequence.
fn resolve_outcome(
    lister: Result<(), AbortReason>,
    importer: Result<(), AbortReason>,
) -> RunOutcome {
    match (lister, importer) {
        (_, Err(reason @ AbortReason::SubmissionBreakerTripped { .. })) => {
            RunOutcome::Aborted(reason)
        }
        (Err(reason), _) if reason != AbortReason::Cancelled => RunOutcome::Aborted(reason),
        (_, Err(reason @ AbortReason::StageFailed(_))) => RunOutcome::Aborted(reason),
        (Ok(()), Ok(())) => RunOutcome::Completed,
        _ => RunOutcome::Aborted(AbortReason::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_run_completes() {
        assert_eq!(resolve_outcome(Ok(()), Ok(())), RunOutcome::Completed);
    }

    #[test]
    fn test_panicked_stage_is_reported() {
        let outcome = resolve_outcome(Err(AbortReason::StageFailed("panic".into())), Ok(()));
        assert_eq!(
            outcome,
            RunOutcome::Aborted(AbortReason::StageFailed("panic".into()))
        );
    }

    #[test]
    fn test_import_breaker_wins_over_cancelled_lister() {
        let outcome = resolve_outcome(
            Err(AbortReason::Cancelled),
            Err(AbortReason::SubmissionBreakerTripped { failures: 11 }),
        );
        assert_eq!(
            outcome,
            RunOutcome::Aborted(AbortReason::SubmissionBreakerTripped { failures: 11 })
        );
    }

    #[test]
    fn test_lister_failure_wins_over_cancelled_importer() {
        let outcome = resolve_outcome(
            Err(AbortReason::SigningBreakerTripped { failures: 11 }),
            Err(AbortReason::Cancelled),
        );
        assert_eq!(
            outcome,
            RunOutcome::Aborted(AbortReason::SigningBreakerTripped { failures: 11 })
        );
    }

    #[test]
    fn test_external_cancel() {
        let outcome = resolve_outcome(Err(AbortReason::Cancelled), Err(AbortReason::Cancelled));
        assert_eq!(outcome, RunOutcome::Aborted(AbortReason::Cancelled));
    }
}
