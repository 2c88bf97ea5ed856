//! One file's upload lifecycle: open, transfer, close, classify.
//!
//! [`upload_file`] never fails: every error on the way is folded into an
//! [`UploadOutcome::Failure`], so the scheduler only ever sees data.

use std::path::{Component, Path, PathBuf};

use tokio::fs::File;
use tracing::{error, info};

use crate::config::BlobNaming;
use crate::contract::{BackendError, BlobBackend, ContainerHandle};
use crate::error::{UploadError, UploadErrorKind};

/// Result of uploading one discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success { path: PathBuf, blob_name: String },
    Failure(UploadError),
}

impl UploadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            UploadOutcome::Success { path, .. } => path,
            UploadOutcome::Failure(e) => &e.path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }
}

/// Per-run settings every task shares.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub root: PathBuf,
    pub naming: BlobNaming,
    pub max_block_size: u64,
}

/// Blob name for `path` under the given naming scheme.
pub fn blob_name(path: &Path, root: &Path, naming: BlobNaming) -> String {
    let file_name = || {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    };
    match naming {
        BlobNaming::FileName => file_name(),
        BlobNaming::RelativePath => match path.strip_prefix(root) {
            Ok(rel) => rel
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => file_name(),
        },
    }
}

/// Uploads `path` into `container` and reports the outcome.
///
/// Prints exactly one completion or failure line for the file.
pub async fn upload_file<B>(
    backend: &B,
    container: &ContainerHandle,
    path: PathBuf,
    settings: &TransferSettings,
) -> UploadOutcome
where
    B: BlobBackend + ?Sized,
{
    let blob_name = blob_name(&path, &settings.root, settings.naming);

    let result = {
        // The handle lives only for this block and is closed on every exit from it.
        match File::open(&path).await {
            Ok(mut file) => backend
                .upload_blob(container, &blob_name, &mut file, settings.max_block_size)
                .await
                .map_err(|e| classify(&path, &blob_name, e)),
            Err(e) => Err(UploadError {
                path: path.clone(),
                blob_name: blob_name.clone(),
                kind: UploadErrorKind::Open,
                message: e.to_string(),
            }),
        }
    };

    match result {
        Ok(()) => {
            println!("Upload of {} completed", path.display());
            info!(path = %path.display(), blob = %blob_name, container = container.name(), "[UPLOAD] Blob uploaded");
            UploadOutcome::Success { path, blob_name }
        }
        Err(e) => {
            match e.status_code() {
                Some(status) => println!("Failed to upload {} with error: {status}", path.display()),
                None => println!("Failed to upload {}: {}", path.display(), e.message),
            }
            error!(path = %path.display(), blob = %blob_name, kind = ?e.kind, error = %e.message, "[UPLOAD][ERROR] Blob upload failed");
            UploadOutcome::Failure(e)
        }
    }
}

fn classify(path: &Path, blob_name: &str, e: BackendError) -> UploadError {
    let kind = match &e {
        BackendError::Status { code, .. } => UploadErrorKind::Remote { status: *code },
        BackendError::Transport(_) | BackendError::Io(_) => UploadErrorKind::Transfer,
    };
    UploadError {
        path: path.to_path_buf(),
        blob_name: blob_name.to_string(),
        kind,
        message: e.to_string(),
    }
}
