//! Error taxonomy for a run.
//!
//! Fatal kinds ([`ConfigError`], [`DiscoveryError`], [`ProvisioningError`]) abort the
//! run before any upload starts and are carried to the caller as [`RunError`].
//! [`UploadError`] is per file: it is recorded in an outcome and never propagated.

use std::path::PathBuf;

use thiserror::Error;

use crate::contract::BackendError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("max_block_size must be at least 1 byte")]
    ZeroBlockSize,
    #[error("container name must not be empty")]
    EmptyContainerName,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery root {} does not exist", .0.display())]
    RootMissing(PathBuf),
    #[error("discovery root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("discovery root {} is not readable: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
#[error("failed to create container {container}: {source}")]
pub struct ProvisioningError {
    pub container: String,
    #[source]
    pub source: BackendError,
}

/// A fatal, non-per-file error that aborted the run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
}

/// What went wrong while uploading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// The local file could not be opened.
    Open,
    /// The remote answered with a status code.
    Remote { status: u16 },
    /// Anything else during transfer (transport, read errors).
    Transfer,
}

/// Per-file upload failure. Data, not control flow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to upload {} as {blob_name}: {message}", .path.display())]
pub struct UploadError {
    pub path: PathBuf,
    pub blob_name: String,
    pub kind: UploadErrorKind,
    pub message: String,
}

impl UploadError {
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            UploadErrorKind::Remote { status } => Some(status),
            _ => None,
        }
    }
}
