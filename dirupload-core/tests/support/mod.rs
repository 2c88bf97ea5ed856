#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dirupload_core::contract::{
    BackendError, BlobBackend, ContainerHandle, CreateContainerResponse,
};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Backend stub that records calls and the peak number of concurrent uploads.
///
/// Mock closures complete synchronously, so concurrency is only observable through
/// a stub that actually suspends inside `upload_blob`.
pub struct RecordingBackend {
    pub delay: Duration,
    pub fail_blob: Option<String>,
    pub container_exists: bool,
    pub create_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub uploaded: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fail_blob: None,
            container_exists: false,
            create_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            uploaded: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, blob_name: &str) -> Self {
        self.fail_blob = Some(blob_name.to_string());
        self
    }

    pub fn with_existing_container(mut self) -> Self {
        self.container_exists = true;
        self
    }

    pub fn blob_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .uploaded
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl BlobBackend for RecordingBackend {
    async fn create_container(&self, _name: &str) -> CreateContainerResponse {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.container_exists {
            CreateContainerResponse::AlreadyExists
        } else {
            CreateContainerResponse::Created
        }
    }

    async fn upload_blob(
        &self,
        _container: &ContainerHandle,
        blob_name: &str,
        file: &mut File,
        _max_block_size: u64,
    ) -> Result<(), BackendError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let mut content = Vec::new();
        let read = file.read_to_end(&mut content).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        read?;

        if self.fail_blob.as_deref() == Some(blob_name) {
            return Err(BackendError::Status {
                code: 500,
                message: "InternalError".to_string(),
            });
        }
        self.uploaded
            .lock()
            .unwrap()
            .push((blob_name.to_string(), content));
        Ok(())
    }
}

/// Writes `names` into `dir` (creating parent directories) and returns their paths.
pub fn write_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, format!("<doc>{name}</doc>")).unwrap();
            path
        })
        .collect()
}
