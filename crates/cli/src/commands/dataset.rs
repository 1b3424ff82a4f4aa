use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use hasty_core::{pipeline::parse_uuid, HastyClient, IngestionClient};

/// Execute `dataset create`: print the new dataset as JSON on stdout.
pub async fn create(config_path: Option<&Path>, project: &str, name: &str) -> Result<()> {
    let config = super::load(config_path)?;

    let project_id =
        parse_uuid(project).with_context(|| format!("Project ID must be a UUID: {}", project))?;
    if name.trim().is_empty() {
        bail!("Dataset name cannot be empty");
    }

    let client = HastyClient::new(&config.hasty).context("Failed to create Hasty client")?;
    let dataset = client
        .create_dataset(&project_id, name)
        .await
        .context("Failed to create dataset")?;
    info!(dataset_id = %dataset.id, "Dataset created");

    println!("{}", serde_json::to_string_pretty(&dataset)?);
    Ok(())
}
