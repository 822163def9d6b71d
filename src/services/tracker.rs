//! Operation progress state machine
//!
//! `pending -> processing -> {completed, failed, cancelled}`. Terminal states
//! are absorbing: every mutator on a terminal tracker is rejected.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::defaults::PROGRESS_PUBLISH_EVERY;
use crate::types::{
    BulkOperation, FieldError, OperationFailure, OperationKind, OperationStatus,
    OperationStatusUpdate,
};

/// Largest progress value reported while still processing
const PROCESSING_PROGRESS_CAP: u8 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("operation is already {0:?}")]
    Terminal(OperationStatus),

    #[error("operation has not started")]
    NotStarted,

    #[error("operation has already started")]
    AlreadyStarted,

    #[error("processed {processed} of {total} records")]
    Overflow { processed: u32, total: u32 },
}

// ==========================================================================
// Tests First (TDD)
// ==========================================================================


// ==========================================================================
// State machine
// ==========================================================================

/// Owns one `BulkOperation` and enforces its lifecycle
#[derive(Debug)]
pub struct OperationTracker {
    op: BulkOperation,
}

impl OperationTracker {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            op: BulkOperation::new(kind),
        }
    }

    pub fn id(&self) -> Uuid {
        self.op.id
    }

    pub fn status(&self) -> OperationStatus {
        self.op.status
    }

    pub fn operation(&self) -> &BulkOperation {
        &self.op
    }

    pub fn snapshot(&self) -> BulkOperation {
        self.op.clone()
    }

    fn ensure_processing(&self) -> Result<(), TransitionError> {
        match self.op.status {
            OperationStatus::Processing => Ok(()),
            OperationStatus::Pending => Err(TransitionError::NotStarted),
            terminal => Err(TransitionError::Terminal(terminal)),
        }
    }

    /// pending -> processing
    pub fn start(&mut self, total: u32) -> Result<(), TransitionError> {
        match self.op.status {
            OperationStatus::Pending => {
                self.op.status = OperationStatus::Processing;
                self.op.total_records = total;
                Ok(())
            }
            OperationStatus::Processing => Err(TransitionError::AlreadyStarted),
            terminal => Err(TransitionError::Terminal(terminal)),
        }
    }

    fn advance(&mut self) -> Result<(), TransitionError> {
        self.ensure_processing()?;
        if self.op.processed_records >= self.op.total_records {
            return Err(TransitionError::Overflow {
                processed: self.op.processed_records,
                total: self.op.total_records,
            });
        }
        self.op.processed_records += 1;

        let pct = (self.op.processed_records as u64 * 100 / self.op.total_records as u64) as u8;
        self.op.progress = self.op.progress.max(pct.min(PROCESSING_PROGRESS_CAP));
        Ok(())
    }

    pub fn record_success(&mut self) -> Result<(), TransitionError> {
        self.advance()?;
        self.op.success_count += 1;
        Ok(())
    }

    /// Record attempted by the store but refused
    pub fn record_failure(&mut self, error: FieldError) -> Result<(), TransitionError> {
        self.advance()?;
        self.op.error_count += 1;
        self.op.errors.push(error);
        Ok(())
    }

    /// Row blocked by validation, never submitted
    pub fn record_skipped(&mut self, errors: Vec<FieldError>) -> Result<(), TransitionError> {
        self.ensure_processing()?;
        self.op.skipped_rows += 1;
        self.op.errors.extend(errors);
        Ok(())
    }

    fn finish(&mut self, status: OperationStatus) -> Result<(), TransitionError> {
        self.ensure_processing()?;
        self.op.status = status;
        self.op.progress = 100;
        self.op.completed_at = Some(Utc::now());
        self.op.errors.sort_by_key(|e| e.row);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.finish(OperationStatus::Completed)
    }

    pub fn fail(&mut self, failure: OperationFailure) -> Result<(), TransitionError> {
        self.finish(OperationStatus::Failed)?;
        self.op.failure = Some(failure);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.finish(OperationStatus::Cancelled)
    }

    /// pending -> processing(0) -> failed, for input refused before any work
    pub fn reject_input(&mut self, failure: OperationFailure) -> Result<(), TransitionError> {
        self.start(0)?;
        self.fail(failure)
    }
}

// ==========================================================================
// Shared handle
// ==========================================================================

/// Caller-side reference to a registered operation.
///
/// Wraps the shared tracker, its cancellation token and the status channel.
/// Every state change goes through here so snapshots get published on each
/// transition and every `PROGRESS_PUBLISH_EVERY` processed records.
#[derive(Clone)]
pub struct OperationHandle {
    id: Uuid,
    tracker: Arc<Mutex<OperationTracker>>,
    token: CancellationToken,
    status_tx: broadcast::Sender<OperationStatusUpdate>,
}

impl OperationHandle {
    pub fn new(
        tracker: OperationTracker,
        token: CancellationToken,
        status_tx: broadcast::Sender<OperationStatusUpdate>,
    ) -> Self {
        Self {
            id: tracker.id(),
            tracker: Arc::new(Mutex::new(tracker)),
            token,
            status_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn snapshot(&self) -> BulkOperation {
        self.tracker.lock().snapshot()
    }

    pub fn status(&self) -> OperationStatus {
        self.tracker.lock().status()
    }

    /// When the operation reached a terminal state, if it has
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.tracker.lock().operation().completed_at
    }

    fn update<F>(&self, f: F) -> Result<(), TransitionError>
    where
        F: FnOnce(&mut OperationTracker) -> Result<(), TransitionError>,
    {
        let published = {
            let mut tracker = self.tracker.lock();
            let status_before = tracker.status();
            let processed_before = tracker.operation().processed_records;
            f(&mut tracker)?;

            let op = tracker.operation();
            let transitioned = op.status != status_before;
            let milestone = op.processed_records != processed_before
                && op.processed_records % PROGRESS_PUBLISH_EVERY == 0;
            (transitioned || milestone).then(|| tracker.snapshot())
        };

        if let Some(op) = published {
            self.publish(op);
        }
        Ok(())
    }

    /// Send a snapshot to whoever is listening; no listener is fine
    pub fn publish(&self, op: BulkOperation) {
        let _ = self.status_tx.send(OperationStatusUpdate::new(op));
    }

    pub fn start(&self, total: u32) -> Result<(), TransitionError> {
        self.update(|t| t.start(total))
    }

    pub fn record_success(&self) -> Result<(), TransitionError> {
        self.update(|t| t.record_success())
    }

    pub fn record_failure(&self, error: FieldError) -> Result<(), TransitionError> {
        self.update(|t| t.record_failure(error))
    }

    pub fn record_skipped(&self, errors: Vec<FieldError>) -> Result<(), TransitionError> {
        self.update(|t| t.record_skipped(errors))
    }

    pub fn complete(&self) -> Result<(), TransitionError> {
        self.update(|t| t.complete())
    }

    pub fn fail(&self, failure: OperationFailure) -> Result<(), TransitionError> {
        self.update(|t| t.fail(failure))
    }

    pub fn cancel(&self) -> Result<(), TransitionError> {
        self.update(|t| t.cancel())
    }

    pub fn reject_input(&self, failure: OperationFailure) -> Result<(), TransitionError> {
        self.update(|t| t.reject_input(failure))
    }
}
