//! # contract: the remote blob-storage seam
//!
//! This module defines the one trait (`BlobBackend`) the pipeline talks to, plus the
//! plain data types that cross it. Everything behind the trait (HTTP transport,
//! authentication, chunked block transfers) belongs to the implementor.
//!
//! ## Interface
//! - `create_container` answers with a [`CreateContainerResponse`] sum type, so the
//!   benign "already exists" case is a variant and never an error to be inspected.
//! - `upload_blob` transfers one open file into one blob. Files larger than the
//!   given block size ceiling are split by the implementor, not by the caller.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, exported as `MockBlobBackend` when the
//!   `test-export-mocks` feature is on (the default), so dependents can stub it too.

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::File;

use mockall::automock;

/// Block size ceiling for a single put, matching the backend's documented limit.
pub const MAX_PUT_BLOCK_BYTES: u64 = 100 * 1024 * 1024;

/// Opaque reference to a provisioned remote container.
///
/// Created once per run and shared read-only by every upload task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    name: String,
}

impl ContainerHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Answer of the remote service to a create-container request.
#[derive(Debug)]
pub enum CreateContainerResponse {
    Created,
    AlreadyExists,
    Failed(BackendError),
}

/// Failure reported by a [`BlobBackend`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The remote service answered with a non-success status code.
    #[error("remote returned status {code}: {message}")]
    Status { code: u16, message: String },
    /// The request never produced a response (connection, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),
    /// Reading the local file failed mid-transfer.
    #[error("io error: {0}")]
    Io(String),
}

impl BackendError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BackendError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io(e.to_string())
    }
}

/// Remote blob storage as seen by the upload pipeline.
///
/// Implemented by the production REST client and by test mocks. Both methods may be
/// called concurrently from many upload tasks, hence `Send + Sync`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Create a container named `name`.
    async fn create_container(&self, name: &str) -> CreateContainerResponse;

    /// Upload the contents of `file` as blob `blob_name` inside `container`.
    ///
    /// `max_block_size` is the single-put ceiling; above it the implementor chunks.
    async fn upload_blob(
        &self,
        container: &ContainerHandle,
        blob_name: &str,
        file: &mut File,
        max_block_size: u64,
    ) -> Result<(), BackendError>;
}
