pub mod config;
pub mod hasty;
pub mod pipeline;
pub mod storage;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, require_gcs, require_s3, validate_config, Config,
    ConfigError, GcsConfig, HastyConfig, ImportConfig, S3Config, SanitizedConfig,
};
pub use hasty::{HastyClient, HastyError, IngestionClient};
pub use pipeline::{
    AbortReason, ImportPipeline, ImportTarget, PipelineSettings, RunOutcome, RunState,
    TargetError, TransferDescriptor,
};
pub use storage::{GcsStorage, ObjectDescriptor, ObjectStorage, S3Storage, StorageError};
