//! Bucket-to-dataset import pipeline.
//!
//! A run has two stages joined by a bounded queue:
//! - **Lister**: pages through the bucket, skips folder placeholders and signs
//!   a short-lived URL for every file
//! - **Importer**: submits each signed URL to the ingestion API in listing order
//!
//! Each stage keeps its own consecutive-error budget. Either stage giving up,
//! or the caller's shutdown token, cancels the whole run.

mod config;
mod controller;
mod importer;
mod lister;
mod target;
mod types;

pub use config::PipelineSettings;
pub use controller::ImportPipeline;
pub use importer::Importer;
pub use lister::Lister;
pub use target::{parse_uuid, ImportTarget, TargetError};
pub use types::{base_name, AbortReason, ErrorBudget, RunOutcome, RunState, TransferDescriptor};
