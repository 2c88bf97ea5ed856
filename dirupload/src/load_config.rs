/// `load_config` module: Loads a static YAML config file into the core [`UploadConfig`].
///
/// This module is the only place where untrusted YAML is parsed and mapped to the
/// strongly-typed config of `dirupload-core`. Secrets never live in this file: the
/// storage account and key come from the environment (see `StorageCredentials`).
///
/// # Accepted schema
/// ```yaml
/// source:
///   root: ./data
///   extension: ".xml"        # optional, omitted uploads every regular file
/// destination:
///   container: reports       # optional, omitted generates quickstart<N>
///   blob_naming: file_name   # or relative_path
/// concurrency: 20
/// max_block_size: 104857600
/// ```
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use dirupload_core::config::{BlobNaming, PathFilter, UploadConfig, DEFAULT_CONCURRENCY};
use dirupload_core::contract::MAX_PUT_BLOCK_BYTES;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct FileConfig {
    pub source: SourceSection,
    #[serde(default)]
    pub destination: DestinationSection,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub max_block_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SourceSection {
    pub root: PathBuf,
    #[serde(default)]
    pub extension: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DestinationSection {
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub blob_naming: BlobNaming,
}

impl FileConfig {
    pub fn into_upload_config(self) -> UploadConfig {
        let filter = filter_for(self.source.extension);
        UploadConfig {
            root: self.source.root,
            filter,
            container: self.destination.container,
            concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            max_block_size: self.max_block_size.unwrap_or(MAX_PUT_BLOCK_BYTES),
            blob_naming: self.destination.blob_naming,
        }
    }
}

/// Suffix filter for `Some(ext)`, every regular file for `None`.
pub fn filter_for(extension: Option<String>) -> PathFilter {
    match extension {
        Some(ext) if !ext.is_empty() => PathFilter::Suffix(ext),
        _ => PathFilter::AllFiles,
    }
}

/// Loads a static YAML config file (no secrets) into an [`UploadConfig`].
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<UploadConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: FileConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let config = raw.into_upload_config();
    config.trace_loaded();
    Ok(config)
}
