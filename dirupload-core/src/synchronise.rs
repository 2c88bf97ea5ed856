//! High-level pipeline: orchestrates discover → provision → upload for one directory.
//!
//! This module ties the phases together in strict order:
//!   - Validates the config and the discovery root (no network call is made for a bad root)
//!   - Provisions the destination container via [`ensure_container`] and waits for it
//!   - Streams discovered paths into the bounded [`schedule`]r
//!   - Aggregates every [`UploadOutcome`] into a [`SynchroniseReport`]
//!
//! # Error Handling
//! Only fatal errors ([`RunError`]) are returned, and all of them happen before the
//! first upload. Per-file failures land in [`SynchroniseReport::failed`].

use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info};

use crate::config::UploadConfig;
use crate::contract::BlobBackend;
use crate::discover::FileDiscoverer;
use crate::error::{RunError, UploadError};
use crate::provision::{ensure_container, ProvisionStatus};
use crate::scheduler::{schedule, RunState};
use crate::transfer::{TransferSettings, UploadOutcome};

#[derive(Debug)]
pub struct SynchroniseReport {
    pub container: String,
    pub provisioning: ProvisionStatus,
    pub succeeded: Vec<UploadedFile>,
    pub failed: Vec<UploadError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub blob_name: String,
}

impl SynchroniseReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Uploaded {} of {} files ({} failed)",
            self.succeeded.len(),
            self.total(),
            self.failed.len()
        )
    }
}

/// Entrypoint: upload everything `config` selects through `backend`.
pub async fn synchronise<B>(
    config: &UploadConfig,
    backend: &B,
) -> Result<SynchroniseReport, RunError>
where
    B: BlobBackend + ?Sized,
{
    info!("[SYNC] Starting directory upload");
    config.validate()?;

    let discoverer = FileDiscoverer::new(&config.root, config.filter.clone()).map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Discovery root rejected");
        e
    })?;

    let container_name = config.container_name();
    let provisioned = ensure_container(backend, &container_name).await?;

    let state = Arc::new(RunState::new(config.concurrency, provisioned.handle.clone()));
    let settings = TransferSettings {
        root: discoverer.root().to_path_buf(),
        naming: config.blob_naming,
        max_block_size: config.max_block_size,
    };
    info!(
        container = %container_name,
        concurrency = state.concurrency(),
        "[SYNC] Container ready, starting uploads"
    );

    let paths = discoverer.into_stream(config.concurrency);
    let mut outcomes = pin!(schedule(paths, backend, Arc::clone(&state), &settings));

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    while let Some(outcome) = outcomes.next().await {
        match outcome {
            UploadOutcome::Success { path, blob_name } => {
                succeeded.push(UploadedFile { path, blob_name })
            }
            UploadOutcome::Failure(e) => failed.push(e),
        }
    }

    let report = SynchroniseReport {
        container: container_name,
        provisioning: provisioned.status,
        succeeded,
        failed,
    };
    info!(
        admitted = state.admitted(),
        completed = state.completed(),
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "[SYNC] Directory upload finished"
    );
    Ok(report)
}
