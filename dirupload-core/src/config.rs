use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::contract::MAX_PUT_BLOCK_BYTES;
use crate::error::ConfigError;

pub const DEFAULT_CONCURRENCY: usize = 20;

pub const ACCOUNT_ENV: &str = "AZURE_STORAGE_ACCOUNT";
pub const ACCESS_KEY_ENV: &str = "AZURE_STORAGE_ACCESS_KEY";
pub const ENDPOINT_ENV: &str = "AZURE_STORAGE_ENDPOINT";

/// Caller supplied predicate over `(path, is_dir)`.
pub type PathPredicate = Arc<dyn Fn(&Path, bool) -> bool + Send + Sync>;

/// Which walked entries become upload candidates.
#[derive(Clone)]
pub enum PathFilter {
    /// Non-directory entries whose path string ends with the suffix (e.g. `.xml`).
    Suffix(String),
    /// Every regular file.
    AllFiles,
    /// Custom predicate; the only filter that can admit directories.
    Custom(PathPredicate),
}

impl PathFilter {
    pub fn suffix(suffix: impl Into<String>) -> Self {
        PathFilter::Suffix(suffix.into())
    }

    pub fn admits(&self, path: &Path, is_dir: bool) -> bool {
        match self {
            PathFilter::Suffix(suffix) => !is_dir && path.to_string_lossy().ends_with(suffix.as_str()),
            PathFilter::AllFiles => !is_dir,
            PathFilter::Custom(predicate) => predicate(path, is_dir),
        }
    }
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFilter::Suffix(s) => f.debug_tuple("Suffix").field(s).finish(),
            PathFilter::AllFiles => f.write_str("AllFiles"),
            PathFilter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How a discovered file is named inside the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobNaming {
    /// Final path component only.
    #[default]
    FileName,
    /// Path relative to the discovery root, `/` separated.
    RelativePath,
}

/// Everything one upload run needs, minus credentials.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub root: PathBuf,
    pub filter: PathFilter,
    /// `None` generates a `quickstart<N>` name for the run.
    pub container: Option<String>,
    pub concurrency: usize,
    pub max_block_size: u64,
    pub blob_naming: BlobNaming,
}

impl UploadConfig {
    pub fn new(root: impl Into<PathBuf>, filter: PathFilter) -> Self {
        Self {
            root: root.into(),
            filter,
            container: None,
            concurrency: DEFAULT_CONCURRENCY,
            max_block_size: MAX_PUT_BLOCK_BYTES,
            blob_naming: BlobNaming::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.max_block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if matches!(self.container.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(ConfigError::EmptyContainerName);
        }
        Ok(())
    }

    /// The configured container name, or a fresh `quickstart<N>` with N in 0..1000.
    pub fn container_name(&self) -> String {
        match &self.container {
            Some(name) => name.clone(),
            None => format!("quickstart{}", uuid::Uuid::new_v4().as_u128() % 1000),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            root = %self.root.display(),
            container = self.container.as_deref().unwrap_or("<generated>"),
            concurrency = self.concurrency,
            max_block_size = self.max_block_size,
            "Loaded UploadConfig"
        );
        debug!(?self, "UploadConfig loaded (full debug)");
    }
}

/// Account credentials for the storage service.
#[derive(Clone)]
pub struct StorageCredentials {
    pub account: String,
    pub access_key: String,
    /// Service endpoint override, e.g. a local emulator.
    pub endpoint: Option<String>,
}

impl StorageCredentials {
    /// Reads `AZURE_STORAGE_ACCOUNT` and `AZURE_STORAGE_ACCESS_KEY` (both required)
    /// and the optional `AZURE_STORAGE_ENDPOINT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let account = require_env(ACCOUNT_ENV)?;
        let access_key = require_env(ACCESS_KEY_ENV)?;
        let endpoint = std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.is_empty());
        info!(
            account = %account,
            endpoint_override = endpoint.is_some(),
            "Storage credentials found in env"
        );
        Ok(Self {
            account,
            access_key,
            endpoint,
        })
    }
}

// The key stays out of logs.
impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("account", &self.account)
            .field("access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn require_env(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => {
            tracing::error!(var, "Required environment variable not set");
            Err(ConfigError::MissingCredential(var))
        }
    }
}
