//! Lazy file discovery under a root directory.
//!
//! The root is validated eagerly in [`FileDiscoverer::new`]; the walk itself only
//! happens as the consumer pulls paths. [`FileDiscoverer::into_stream`] moves the walk
//! onto a blocking thread and hands each path over a bounded channel, so exactly one
//! consumer receives every path and the walk never runs far ahead of the uploads.

use std::path::{Path, PathBuf};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::PathFilter;
use crate::error::DiscoveryError;

#[derive(Debug, Clone)]
pub struct FileDiscoverer {
    root: PathBuf,
    filter: PathFilter,
}

impl FileDiscoverer {
    /// Fails with [`DiscoveryError`] if `root` is missing, not a directory, or unreadable.
    pub fn new(root: impl Into<PathBuf>, filter: PathFilter) -> Result<Self, DiscoveryError> {
        let root = root.into();
        let metadata = match std::fs::metadata(&root) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DiscoveryError::RootMissing(root));
            }
            Err(source) => return Err(DiscoveryError::Unreadable { path: root, source }),
        };
        if !metadata.is_dir() {
            return Err(DiscoveryError::NotADirectory(root));
        }
        if let Err(source) = std::fs::read_dir(&root) {
            return Err(DiscoveryError::Unreadable { path: root, source });
        }
        info!(root = %root.display(), ?filter, "Discovery root validated");
        Ok(Self { root, filter })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Matching paths in walk order. Lazy: nothing is read until iterated.
    ///
    /// Entries that fail to read below the root are logged and skipped.
    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(
                        path = ?e.path(),
                        error = %e,
                        "Skipping unreadable entry during discovery"
                    );
                    None
                }
            })
            .filter(|entry| self.filter.admits(entry.path(), entry.file_type().is_dir()))
            .map(|entry| entry.into_path())
    }

    /// Runs the walk on a blocking thread, handing paths over a channel of `buffer` slots.
    ///
    /// Dropping the stream stops the walk at its next send.
    pub fn into_stream(self, buffer: usize) -> BoxStream<'static, PathBuf> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        tokio::task::spawn_blocking(move || {
            let mut count = 0_usize;
            for path in self.paths() {
                debug!(path = %path.display(), "Discovered file");
                if tx.blocking_send(path).is_err() {
                    debug!("Path consumer dropped, stopping discovery");
                    break;
                }
                count += 1;
            }
            info!(count, root = %self.root.display(), "Discovery finished");
        });
        stream::unfold(rx, |mut rx| async move {
            let path = rx.recv().await?;
            Some((path, rx))
        })
        .boxed()
    }
}
