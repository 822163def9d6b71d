//! Operation registry
//!
//! Every operation lives here under its id from the moment it is started
//! until its owner dismisses it. Each session may have at most one operation
//! that has not reached a terminal state. Finished operations nobody
//! dismisses are evicted oldest first once more than a fixed number pile up.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::defaults::{MAX_RETAINED_FINISHED, STATUS_CHANNEL_CAPACITY};
use crate::error::PipelineError;
use crate::services::cancellation::{CancelError, CancellationRegistry, OperationGuard};
use crate::services::tracker::{OperationHandle, OperationTracker};
use crate::types::{BulkOperation, ExportArtifact, OperationKind, OperationStatus, OperationStatusUpdate};

struct RegistryEntry {
    owner: Uuid,
    handle: OperationHandle,
    artifact: Option<Arc<ExportArtifact>>,
}

#[derive(Clone)]
pub struct OperationRegistry {
    entries: Arc<Mutex<HashMap<Uuid, RegistryEntry>>>,
    cancellation: CancellationRegistry,
    status_tx: broadcast::Sender<OperationStatusUpdate>,
    max_finished: usize,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::with_retention(MAX_RETAINED_FINISHED)
    }

    /// Registry that keeps at most `max_finished` undismissed terminal operations
    pub fn with_retention(max_finished: usize) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            cancellation: CancellationRegistry::default(),
            status_tx,
            max_finished,
        }
    }

    /// Status snapshots of every operation
    pub fn subscribe(&self) -> broadcast::Receiver<OperationStatusUpdate> {
        self.status_tx.subscribe()
    }

    /// Register a new pending operation for `session`.
    ///
    /// Fails with `SessionBusy` while another operation of the same session is
    /// still live.
    pub fn begin(
        &self,
        kind: OperationKind,
        session: Uuid,
    ) -> Result<(OperationHandle, OperationGuard), PipelineError> {
        let mut entries = self.entries.lock();

        if let Some((id, _)) = entries
            .iter()
            .find(|(_, e)| e.owner == session && !e.handle.status().is_terminal())
        {
            return Err(PipelineError::SessionBusy(*id));
        }
        self.evict_finished(&mut entries);

        let tracker = OperationTracker::new(kind);
        let id = tracker.id();
        let (token, guard) = self.cancellation.register(id, session);
        let handle = OperationHandle::new(tracker, token, self.status_tx.clone());

        entries.insert(
            id,
            RegistryEntry {
                owner: session,
                handle: handle.clone(),
                artifact: None,
            },
        );
        drop(entries);

        handle.publish(handle.snapshot());
        Ok((handle, guard))
    }

    /// Drop the oldest terminal entries beyond the retention limit. Live
    /// operations are never evicted.
    fn evict_finished(&self, entries: &mut HashMap<Uuid, RegistryEntry>) {
        let mut finished: Vec<_> = entries
            .iter()
            .filter_map(|(id, e)| e.handle.completed_at().map(|at| (at, *id)))
            .collect();
        if finished.len() <= self.max_finished {
            return;
        }

        finished.sort();
        let excess = finished.len() - self.max_finished;
        for (_, id) in finished.into_iter().take(excess) {
            entries.remove(&id);
        }
        debug!("Evicted {} finished operations", excess);
    }

    fn with_owned<T>(
        &self,
        id: Uuid,
        session: Uuid,
        f: impl FnOnce(&mut RegistryEntry) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(&id)
            .ok_or(PipelineError::OperationNotFound(id))?;
        if entry.owner != session {
            return Err(PipelineError::NotOwner(id));
        }
        f(entry)
    }

    /// Current snapshot of an operation owned by `session`
    pub fn status(&self, id: Uuid, session: Uuid) -> Result<BulkOperation, PipelineError> {
        self.with_owned(id, session, |e| Ok(e.handle.snapshot()))
    }

    /// Request cancellation. `Ok(false)` if the operation already finished.
    pub fn cancel(&self, id: Uuid, session: Uuid) -> Result<bool, PipelineError> {
        self.with_owned(id, session, |_| Ok(()))?;
        match self.cancellation.cancel(&id, session) {
            Ok(cancelled) => Ok(cancelled),
            Err(CancelError::NotOwner) => Err(PipelineError::NotOwner(id)),
        }
    }

    /// Remove a terminal operation
    pub fn dismiss(&self, id: Uuid, session: Uuid) -> Result<BulkOperation, PipelineError> {
        let op = self.with_owned(id, session, |e| {
            let op = e.handle.snapshot();
            if op.status.is_terminal() {
                Ok(op)
            } else {
                Err(PipelineError::NotReady(id))
            }
        })?;
        self.entries.lock().remove(&id);
        Ok(op)
    }

    /// Attach a finished export file to its operation
    pub fn store_artifact(&self, id: Uuid, artifact: ExportArtifact) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.artifact = Some(Arc::new(artifact));
        }
    }

    /// Export file of a completed operation
    pub fn artifact(&self, id: Uuid, session: Uuid) -> Result<Arc<ExportArtifact>, PipelineError> {
        self.with_owned(id, session, |e| match (&e.artifact, e.handle.status()) {
            (Some(artifact), OperationStatus::Completed) => Ok(Arc::clone(artifact)),
            _ => Err(PipelineError::NotReady(id)),
        })
    }
}

#[cfg(test)]
impl OperationRegistry {
    /// Operations currently registered (live and finished, not dismissed)
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_cancellation_registered(&self, id: &Uuid) -> bool {
        self.cancellation.is_registered(id)
    }
}
