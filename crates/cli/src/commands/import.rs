use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hasty_core::{
    require_gcs, require_s3, GcsStorage, HastyClient, ImportPipeline, ImportTarget,
    ObjectStorage, PipelineSettings, RunOutcome, S3Storage,
};

use crate::ImportArgs;

/// Bucket provider an import reads from.
#[derive(Debug, Clone, Copy)]
pub enum Provider {
    S3,
    Gcs,
}

/// Execute `images s3-import` / `images gcs-import`.
pub async fn execute(config_path: Option<&Path>, provider: Provider, args: &ImportArgs) -> Result<()> {
    let config = super::load(config_path)?;

    let target = ImportTarget::new(&args.bucket, &args.prefix, &args.project, &args.dataset)
        .context("Invalid import target")?;

    let storage: Arc<dyn ObjectStorage> = match provider {
        Provider::S3 => {
            let s3 = require_s3(&config).context("S3 is not configured")?;
            Arc::new(S3Storage::new(s3.clone()))
        }
        Provider::Gcs => {
            let gcs = require_gcs(&config).context("GCS is not configured")?;
            Arc::new(GcsStorage::new(gcs.clone()))
        }
    };
    let client = Arc::new(HastyClient::new(&config.hasty).context("Failed to create Hasty client")?);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        crate::shutdown_signal().await;
        warn!("Shutdown signal received, stopping import");
        signal_token.cancel();
    });

    info!(
        provider = storage.name(),
        bucket = %target.bucket,
        prefix = %target.prefix,
        "Importing into dataset {}",
        target.dataset_id
    );
    let pipeline = ImportPipeline::new(storage, client, PipelineSettings::from(&config.import));

    match pipeline.execute(&target, &shutdown).await {
        RunOutcome::Completed => Ok(()),
        RunOutcome::Aborted(reason) => bail!("Import aborted: {}", reason),
    }
}
