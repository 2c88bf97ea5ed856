//! Bounded fan-out of upload tasks over a pulled path stream.
//!
//! At most `concurrency` uploads are in flight. A path is pulled from the input only
//! when a slot is free, and the output ends exactly when the input is exhausted and
//! every admitted upload has completed. Outcomes come out in completion order.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{Stream, StreamExt};
use tracing::debug;

use crate::contract::{BlobBackend, ContainerHandle};
use crate::transfer::{upload_file, TransferSettings, UploadOutcome};

/// Process-wide state for one run: concurrency budget, container and tallies.
#[derive(Debug)]
pub struct RunState {
    concurrency: usize,
    container: ContainerHandle,
    admitted: AtomicUsize,
    completed: AtomicUsize,
}

impl RunState {
    pub fn new(concurrency: usize, container: ContainerHandle) -> Self {
        Self {
            concurrency: concurrency.max(1),
            container,
            admitted: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn container(&self) -> &ContainerHandle {
        &self.container
    }

    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.admitted().saturating_sub(self.completed())
    }
}

/// Schedules one upload per path, never more than `state.concurrency()` at once.
///
/// Failures are ordinary outcomes and never stop admission of remaining paths.
pub fn schedule<'a, B, S>(
    paths: S,
    backend: &'a B,
    state: Arc<RunState>,
    settings: &'a TransferSettings,
) -> impl Stream<Item = UploadOutcome> + 'a
where
    B: BlobBackend + ?Sized,
    S: Stream<Item = PathBuf> + 'a,
{
    let concurrency = state.concurrency();
    paths
        .map(move |path| {
            let state = Arc::clone(&state);
            let admitted = state.admitted.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(path = %path.display(), admitted, "[SCHEDULE] Admitting upload");
            async move {
                let outcome = upload_file(backend, &state.container, path, settings).await;
                let completed = state.completed.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(completed, in_flight = state.in_flight(), "[SCHEDULE] Upload finished");
                outcome
            }
        })
        .buffer_unordered(concurrency)
}
