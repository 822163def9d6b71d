//! Import execution
//!
//! Re-validates every row, submits the valid ones to the record store in
//! row order and accounts for each outcome on the operation handle. A store
//! that is unreachable before the first submission fails the operation. Once
//! records have been created, an outage is charged to the row that hit it and
//! to every row not yet submitted, and the operation still completes.

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::services::record_store::{RecordStore, RECORD_FIELD};
use crate::services::tracker::OperationHandle;
use crate::services::validator;
use crate::types::{
    BulkOperation, CandidateRecord, FieldError, OperationFailure, PropertyDraft, RawRow, Schema,
};

/// Run an import of `rows` on an operation that is still pending.
///
/// Returns the terminal snapshot. `Err` only signals a broken state machine.
pub async fn execute(
    rows: &[RawRow],
    schema: &Schema,
    store: &dyn RecordStore,
    handle: &OperationHandle,
) -> Result<BulkOperation, PipelineError> {
    let mut candidates: Vec<CandidateRecord> = Vec::new();
    let mut blocked: Vec<Vec<FieldError>> = Vec::new();

    for row in rows {
        let result = validator::validate(row, schema);
        match result.candidate {
            Some(candidate) => candidates.push(candidate),
            None => blocked.push(result.issues.into_iter().filter(FieldError::is_blocking).collect()),
        }
    }

    handle.start(candidates.len() as u32)?;
    info!(
        "Import {}: {} rows, {} valid, {} blocked by validation",
        handle.id(),
        rows.len(),
        candidates.len(),
        blocked.len()
    );

    for errors in blocked {
        handle.record_skipped(errors)?;
    }

    if handle.is_cancelled() {
        handle.cancel()?;
        return Ok(handle.snapshot());
    }

    if let Err(e) = store.check_available().await {
        warn!("Import {} aborted, record store {} unavailable: {}", handle.id(), store.name(), e);
        handle.fail(OperationFailure::systemic(e.to_string()))?;
        return Ok(handle.snapshot());
    }

    let mut outage: Option<String> = None;
    for candidate in &candidates {
        if let Some(reason) = &outage {
            handle.record_failure(not_submitted(candidate.row, reason))?;
            continue;
        }
        if handle.is_cancelled() {
            info!("Import {} cancelled", handle.id());
            handle.cancel()?;
            return Ok(handle.snapshot());
        }

        let draft = match PropertyDraft::from_candidate(candidate) {
            Ok(draft) => draft,
            Err(error) => {
                handle.record_failure(error)?;
                continue;
            }
        };

        match store.create(&draft).await {
            Ok(_) => handle.record_success()?,
            Err(e) if e.is_systemic() => {
                warn!(
                    "Import {} lost record store at row {}, remaining rows not submitted: {}",
                    handle.id(),
                    candidate.row,
                    e
                );
                handle.record_failure(e.to_field_error(candidate.row))?;
                outage = Some(e.to_string());
            }
            Err(e) => {
                warn!("Import {} row {} rejected: {}", handle.id(), candidate.row, e);
                handle.record_failure(e.to_field_error(candidate.row))?;
            }
        }
    }

    handle.complete()?;
    let op = handle.snapshot();
    info!(
        "Import {} completed: {} created, {} rejected, {} skipped",
        op.id, op.success_count, op.error_count, op.skipped_rows
    );
    Ok(op)
}

fn not_submitted(row: usize, reason: &str) -> FieldError {
    FieldError::error(row, RECORD_FIELD, None, format!("not submitted: {}", reason))
}
