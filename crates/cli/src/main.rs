mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::error;

use commands::import::Provider;
use logging::LogFormat;

#[derive(Parser)]
#[command(
    name = "hasty",
    version,
    about = "Import images from cloud buckets into Hasty datasets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./hasty.toml when present)
    #[arg(long, env = "HASTY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Import images into a dataset
    Images {
        #[command(subcommand)]
        command: ImagesCommand,
    },
    /// Manage datasets
    Dataset {
        #[command(subcommand)]
        command: DatasetCommand,
    },
}

#[derive(Subcommand)]
enum ImagesCommand {
    /// Import every file of an S3 bucket folder
    S3Import(ImportArgs),
    /// Import every file of a GCS bucket folder
    GcsImport(ImportArgs),
}

#[derive(Subcommand)]
enum DatasetCommand {
    /// Create a dataset and print it as JSON
    Create {
        /// Project ID
        #[arg(long)]
        project: String,
        /// Dataset name
        #[arg(long)]
        name: String,
    },
}

#[derive(Args)]
pub(crate) struct ImportArgs {
    /// Source bucket
    #[arg(long)]
    bucket: String,
    /// Key prefix, a folder and/or the start of file names
    #[arg(long, default_value = "")]
    prefix: String,
    /// Project ID
    #[arg(long)]
    project: String,
    /// Dataset ID
    #[arg(long)]
    dataset: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    let config_path = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Images { command } => match command {
            ImagesCommand::S3Import(args) => {
                commands::import::execute(config_path, Provider::S3, args).await
            }
            ImagesCommand::GcsImport(args) => {
                commands::import::execute(config_path, Provider::Gcs, args).await
            }
        },
        Commands::Dataset { command } => match command {
            DatasetCommand::Create { project, name } => {
                commands::dataset::create(config_path, project, name).await
            }
        },
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
