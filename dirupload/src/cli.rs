///
/// This module implements the CLI interface for dirupload: command parsing,
/// config resolution and the async `run` entrypoint.
///
/// All pipeline logic (discovery, provisioning, scheduling) lives in [`dirupload-core`].
/// This module is strictly CLI glue: it resolves the config, builds the production
/// backend and prints the run summary.
///
/// ## How To Use
/// - From the command line: `dirupload upload --root ./data --extension .xml`.
/// - Programmatically or from integration tests: call [`run`] with a constructed [`Cli`].
///
/// [`dirupload-core`]: ../../dirupload-core/
use crate::load_config::{filter_for, load_config};
use crate::upload::AzureBlobClient;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dirupload_core::config::{BlobNaming, StorageCredentials, UploadConfig};
use dirupload_core::synchronise::synchronise;
use std::path::PathBuf;

/// CLI for dirupload: upload a directory tree into a blob container.
#[derive(Parser)]
#[clap(
    name = "dirupload",
    version,
    about = "Upload a directory tree to an Azure Blob Storage container with bounded concurrency"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload every matching file under a directory to a container
    Upload(UploadArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct UploadArgs {
    /// Path to the YAML config file
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Directory to upload (overrides the config file)
    #[clap(long)]
    pub root: Option<PathBuf>,
    /// Only upload files whose path ends with this suffix, e.g. `.xml`
    #[clap(long)]
    pub extension: Option<String>,
    /// Destination container (generated when neither flag nor config sets one)
    #[clap(long)]
    pub container: Option<String>,
    /// Maximum number of uploads in flight
    #[clap(long)]
    pub concurrency: Option<usize>,
    /// Name blobs by their path relative to the root instead of the file name
    #[clap(long)]
    pub relative_names: bool,
}

/// Merges the optional config file with command-line overrides.
pub fn resolve_config(args: &UploadArgs) -> Result<UploadConfig> {
    let mut config = match (&args.config, &args.root) {
        (Some(path), _) => load_config(path)?,
        (None, Some(root)) => UploadConfig::new(root.clone(), filter_for(None)),
        (None, None) => anyhow::bail!("either --config or --root must be given"),
    };

    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    if let Some(extension) = &args.extension {
        config.filter = filter_for(Some(extension.clone()));
    }
    if let Some(container) = &args.container {
        config.container = Some(container.clone());
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if args.relative_names {
        config.blob_naming = BlobNaming::RelativePath;
    }
    Ok(config)
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Upload(args) => {
            let credentials = StorageCredentials::from_env()?;
            let config = resolve_config(&args)?;
            tracing::info!(command = "upload", root = %config.root.display(), "Starting directory upload");

            let client = AzureBlobClient::new(&credentials)
                .context("Failed to construct blob client")?;
            match synchronise(&config, &client).await {
                Ok(report) => {
                    println!("{}", report.summary_line());
                    tracing::info!(command = "upload", ?report, "Directory upload complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "upload", error = %e, "Directory upload aborted");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
