//! Bulk edit execution
//!
//! Applies one set of field updates to many stored records. Updates are
//! checked up front with the same rules as imported cells; a record that
//! cannot be updated is reported against its position in the id list.
//! A store outage after the first update is charged to the remaining ids.

use tracing::{info, warn};

use crate::error::{InputRejection, PipelineError};
use crate::services::record_store::{RecordStore, RECORD_FIELD};
use crate::services::tracker::OperationHandle;
use crate::services::validator;
use crate::types::{BulkEditRequest, BulkOperation, FieldError, FieldUpdate, OperationFailure, Schema};

/// Check and normalize the requested updates
pub fn prepare(request: &BulkEditRequest, schema: &Schema) -> Result<Vec<FieldUpdate>, InputRejection> {
    if request.record_ids.is_empty() {
        return Err(InputRejection::InvalidRequest("no records selected".to_string()));
    }
    if request.updates.is_empty() {
        return Err(InputRejection::InvalidRequest("no updates given".to_string()));
    }

    let mut prepared = Vec::with_capacity(request.updates.len());
    for update in &request.updates {
        let name = update.field_name();
        if prepared.iter().any(|p: &FieldUpdate| p.field_name() == name) {
            return Err(InputRejection::InvalidRequest(format!("{} is updated more than once", name)));
        }
        if update.is_typed() {
            prepared.push(update.clone());
            continue;
        }

        let Some(field) = schema.field(name) else {
            return Err(InputRejection::InvalidRequest(format!("{} cannot be edited", name)));
        };

        match update.text_value().map(str::trim).filter(|v| !v.is_empty()) {
            None if field.required => {
                return Err(InputRejection::InvalidRequest(format!("{}: required", name)));
            }
            None => prepared.push(update.clone().cleared()),
            Some(value) => {
                let checked = validator::check_value(field, value)
                    .map_err(|message| InputRejection::InvalidRequest(format!("{}: {}", name, message)))?;
                prepared.push(update.clone().with_text_value(checked.value));
            }
        }
    }
    Ok(prepared)
}

/// Run a bulk edit on an operation that is still pending
pub async fn execute(
    request: &BulkEditRequest,
    schema: &Schema,
    store: &dyn RecordStore,
    handle: &OperationHandle,
) -> Result<BulkOperation, PipelineError> {
    let updates = match prepare(request, schema) {
        Ok(updates) => updates,
        Err(rejection) => {
            warn!("Bulk edit {} rejected: {}", handle.id(), rejection);
            handle.reject_input(OperationFailure::input_rejected(rejection.to_string()))?;
            return Ok(handle.snapshot());
        }
    };

    handle.start(request.record_ids.len() as u32)?;
    info!(
        "Bulk edit {}: {} records, {} fields",
        handle.id(),
        request.record_ids.len(),
        updates.len()
    );

    if let Err(e) = store.check_available().await {
        warn!("Bulk edit {} aborted, record store unavailable: {}", handle.id(), e);
        handle.fail(OperationFailure::systemic(e.to_string()))?;
        return Ok(handle.snapshot());
    }

    let mut outage: Option<String> = None;
    for (position, id) in request.record_ids.iter().enumerate() {
        if let Some(reason) = &outage {
            handle.record_failure(FieldError::error(
                position,
                RECORD_FIELD,
                Some(id),
                format!("not updated: {}", reason),
            ))?;
            continue;
        }
        if handle.is_cancelled() {
            info!("Bulk edit {} cancelled", handle.id());
            handle.cancel()?;
            return Ok(handle.snapshot());
        }

        match store.update(id, &updates).await {
            Ok(_) => handle.record_success()?,
            Err(e) if e.is_systemic() => {
                warn!("Bulk edit {} lost record store at record {}: {}", handle.id(), id, e);
                let mut error = e.to_field_error(position);
                error.value.get_or_insert_with(|| id.clone());
                handle.record_failure(error)?;
                outage = Some(e.to_string());
            }
            Err(e) => {
                warn!("Bulk edit {} record {} not updated: {}", handle.id(), id, e);
                let mut error = e.to_field_error(position);
                error.value.get_or_insert_with(|| id.clone());
                handle.record_failure(error)?;
            }
        }
    }

    handle.complete()?;
    Ok(handle.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::record_store::InMemoryRecordStore;
    use crate::services::tracker::OperationTracker;
    use crate::types::property::fixtures;
    use crate::types::{FailureCategory, OperationKind, OperationStatus, PropertyStatus};
    use tokio::sync::broadcast;
    use tokio_util::sync::CancellationToken;

    fn handle() -> OperationHandle {
        let (tx, _) = broadcast::channel(64);
        OperationHandle::new(OperationTracker::new(OperationKind::BulkEdit), CancellationToken::new(), tx)
    }

    fn store() -> InMemoryRecordStore {
        InMemoryRecordStore::with_records(vec![
            fixtures::record("p-1", "Alpha", PropertyStatus::Active),
            fixtures::record("p-2", "Bravo", PropertyStatus::Active),
        ])
    }

    fn request(ids: &[&str], updates: Vec<FieldUpdate>) -> BulkEditRequest {
        BulkEditRequest {
            record_ids: ids.iter().map(|s| s.to_string()).collect(),
            updates,
        }
    }

    #[test]
    fn test_prepare_normalizes_values() {
        let prepared = prepare(
            &request(&["p-1"], vec![FieldUpdate::EmergencyContactEmail(Some(" Ops@Site.IO ".into()))]),
            &Schema::property(),
        )
        .unwrap();
        assert_eq!(prepared, vec![FieldUpdate::EmergencyContactEmail(Some("ops@site.io".into()))]);
    }

    #[test]
    fn test_prepare_rejects_invalid_input() {
        let schema = Schema::property();
        assert!(prepare(&request(&[], vec![FieldUpdate::City("X".into())]), &schema).is_err());
        assert!(prepare(&request(&["p-1"], vec![]), &schema).is_err());

        let err = prepare(&request(&["p-1"], vec![FieldUpdate::ZipCode("!!".into())]), &schema).unwrap_err();
        assert_eq!(
            err,
            InputRejection::InvalidRequest("zipCode: must be a valid postal code".to_string())
        );

        let err = prepare(&request(&["p-1"], vec![FieldUpdate::City("  ".into())]), &schema).unwrap_err();
        assert_eq!(err, InputRejection::InvalidRequest("city: required".to_string()));

        let twice = vec![FieldUpdate::City("A".into()), FieldUpdate::City("B".into())];
        assert!(prepare(&request(&["p-1"], twice), &schema).is_err());
    }

    #[test]
    fn test_optional_fields_can_be_cleared() {
        let prepared = prepare(&request(&["p-1"], vec![FieldUpdate::AccessCode(None)]), &Schema::property()).unwrap();
        assert_eq!(prepared, vec![FieldUpdate::AccessCode(None)]);
    }

    #[test]
    fn test_whitespace_only_optional_value_clears_field() {
        let prepared = prepare(
            &request(
                &["p-1"],
                vec![
                    FieldUpdate::AccessCode(Some("   ".into())),
                    FieldUpdate::Timezone(Some("\t".into())),
                ],
            ),
            &Schema::property(),
        )
        .unwrap();
        assert_eq!(prepared, vec![FieldUpdate::AccessCode(None), FieldUpdate::Timezone(None)]);
    }

    #[tokio::test]
    async fn test_updates_records_and_reports_missing_by_position() {
        let store = store();
        let handle = handle();
        let req = request(
            &["p-1", "p-404", "p-2"],
            vec![FieldUpdate::Status(PropertyStatus::Archived)],
        );

        let op = execute(&req, &Schema::property(), &store, &handle).await.unwrap();

        assert_eq!(op.status, OperationStatus::Completed);
        assert_eq!(op.success_count, 2);
        assert_eq!(op.error_count, 1);
        assert_eq!(op.errors[0].row, 1);
        assert_eq!(op.errors[0].value.as_deref(), Some("p-404"));
        assert!(store.records().iter().all(|r| r.status == PropertyStatus::Archived));
    }

    #[tokio::test]
    async fn test_invalid_update_fails_operation_as_input_rejection() {
        let handle = handle();
        let op = execute(
            &request(&["p-1"], vec![FieldUpdate::Timezone(Some("Nowhere".into()))]),
            &Schema::property(),
            &store(),
            &handle,
        )
        .await
        .unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.processed_records, 0);
        assert_eq!(op.failure.unwrap().category, FailureCategory::InputRejected);
    }

    #[tokio::test]
    async fn test_offline_store_fails_systemically() {
        let store = store();
        store.set_offline(true);
        let op = execute(
            &request(&["p-1"], vec![FieldUpdate::City("Dallas".into())]),
            &Schema::property(),
            &store,
            &handle(),
        )
        .await
        .unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.failure.unwrap().category, FailureCategory::Systemic);
    }

    #[tokio::test]
    async fn test_outage_after_first_update_charges_remaining_ids() {
        let store = InMemoryRecordStore::with_records(vec![
            fixtures::record("p-1", "Alpha", PropertyStatus::Active),
            fixtures::record("p-2", "Bravo", PropertyStatus::Active),
            fixtures::record("p-3", "Charlie", PropertyStatus::Active),
        ]);
        store.fail_after(1);
        let op = execute(
            &request(&["p-1", "p-2", "p-3"], vec![FieldUpdate::City("Dallas".into())]),
            &Schema::property(),
            &store,
            &handle(),
        )
        .await
        .unwrap();

        assert_eq!(op.status, OperationStatus::Completed);
        assert_eq!(op.success_count, 1);
        assert_eq!(op.error_count, 2);
        assert_eq!(op.processed_records, 3);
        assert_eq!(op.errors[1].row, 2);
        assert_eq!(op.errors[1].value.as_deref(), Some("p-3"));
        assert!(op.errors[1].message.starts_with("not updated"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_record() {
        let store = store();
        let handle = handle();
        handle.token().cancel();
        let op = execute(
            &request(&["p-1", "p-2"], vec![FieldUpdate::City("Dallas".into())]),
            &Schema::property(),
            &store,
            &handle,
        )
        .await
        .unwrap();
        assert_eq!(op.status, OperationStatus::Cancelled);
        assert!(store.records().iter().all(|r| r.draft.city == "Austin"));
    }
}
