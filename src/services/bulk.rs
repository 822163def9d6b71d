//! Bulk service
//!
//! The single entry point the transport and the CLI talk to. Owns the
//! schema, the record store, the operation registry and the history, and
//! runs every long-running action in its own tokio task.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::services::cancellation::OperationGuard;
use crate::services::export_serializer::{self, ExportError};
use crate::services::history::{OperationHistory, OperationHistoryResponse};
use crate::services::preview::{self, PreviewLimits};
use crate::services::record_store::RecordStore;
use crate::services::registry::OperationRegistry;
use crate::services::tracker::OperationHandle;
use crate::services::upload::{parse_upload, UploadLimits, UploadedFile};
use crate::services::{bulk_edit, import_executor, template};
use crate::types::{
    BulkEditRequest, BulkOperation, ExportArtifact, ExportFormat, ExportOptions, ImportPreview,
    OperationActionResponse, OperationFailure, OperationKind, OperationStatus,
    OperationStatusUpdate, OperationSubmitResponse, PingResponse, Schema,
};

/// Upload and preview bounds
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkLimits {
    pub upload: UploadLimits,
    pub preview: PreviewLimits,
}

#[derive(Clone)]
pub struct BulkService {
    schema: Arc<Schema>,
    store: Arc<dyn RecordStore>,
    registry: OperationRegistry,
    history: OperationHistory,
    limits: BulkLimits,
}

impl BulkService {
    pub fn new(store: Arc<dyn RecordStore>, history: OperationHistory, limits: BulkLimits) -> Self {
        Self {
            schema: Arc::new(Schema::property()),
            store,
            registry: OperationRegistry::new(),
            history,
            limits,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OperationStatusUpdate> {
        self.registry.subscribe()
    }

    pub async fn ping(&self) -> PingResponse {
        let available = match self.store.check_available().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Record store {} unavailable: {}", self.store.name(), e);
                false
            }
        };
        PingResponse {
            message: "Pong".to_string(),
            store: self.store.name().to_string(),
            store_available: available,
            timestamp: Utc::now(),
        }
    }

    pub fn template(&self, format: ExportFormat) -> Result<ExportArtifact, PipelineError> {
        template::generate_file(&self.schema, format)
    }

    /// Parse and classify an upload without persisting anything
    pub fn preview(&self, file: &UploadedFile) -> Result<ImportPreview, PipelineError> {
        let table = parse_upload(file, self.limits.upload)?;
        preview::build(&table, &self.schema, self.limits.preview, &CancellationToken::new())
    }

    // ==========================================================================
    // Long-running operations
    // ==========================================================================

    pub fn submit_import(
        &self,
        session: Uuid,
        file: UploadedFile,
    ) -> Result<OperationSubmitResponse, PipelineError> {
        let (id, _task) = self.start_import(session, file)?;
        Ok(submitted(id, OperationKind::Import, "Import started"))
    }

    pub fn submit_export(
        &self,
        session: Uuid,
        options: ExportOptions,
    ) -> Result<OperationSubmitResponse, PipelineError> {
        let (id, _task) = self.start_export(session, options)?;
        Ok(submitted(id, OperationKind::Export, "Export started"))
    }

    pub fn submit_bulk_edit(
        &self,
        session: Uuid,
        request: BulkEditRequest,
    ) -> Result<OperationSubmitResponse, PipelineError> {
        let (id, _task) = self.start_bulk_edit(session, request)?;
        Ok(submitted(id, OperationKind::BulkEdit, "Bulk edit started"))
    }

    /// Import and wait for the terminal state
    pub async fn run_import(&self, session: Uuid, file: UploadedFile) -> Result<BulkOperation, PipelineError> {
        let (_, task) = self.start_import(session, file)?;
        join(task).await
    }

    /// Export and wait; the artifact is present when the export completed
    pub async fn run_export(
        &self,
        session: Uuid,
        options: ExportOptions,
    ) -> Result<(BulkOperation, Option<Arc<ExportArtifact>>), PipelineError> {
        let (id, task) = self.start_export(session, options)?;
        let op = join(task).await?;
        let artifact = self.registry.artifact(id, session).ok();
        Ok((op, artifact))
    }

    pub async fn run_bulk_edit(
        &self,
        session: Uuid,
        request: BulkEditRequest,
    ) -> Result<BulkOperation, PipelineError> {
        let (_, task) = self.start_bulk_edit(session, request)?;
        join(task).await
    }

    fn start_import(
        &self,
        session: Uuid,
        file: UploadedFile,
    ) -> Result<(Uuid, JoinHandle<BulkOperation>), PipelineError> {
        let (handle, guard) = self.registry.begin(OperationKind::Import, session)?;
        let id = handle.id();
        info!("Import {} submitted by session {}: {}", id, session, file.filename);

        let schema = Arc::clone(&self.schema);
        let store = Arc::clone(&self.store);
        let limits = self.limits.upload;
        let task_handle = handle.clone();

        let task = self.spawn(session, handle, guard, async move {
            let table = match parse_upload(&file, limits) {
                Ok(table) => table,
                Err(rejection) => {
                    warn!("Import {} rejected: {}", task_handle.id(), rejection);
                    task_handle.reject_input(OperationFailure::input_rejected(rejection.to_string()))?;
                    return Ok(task_handle.snapshot());
                }
            };
            drop(file);
            import_executor::execute(&table.rows, &schema, store.as_ref(), &task_handle).await
        });
        Ok((id, task))
    }

    fn start_export(
        &self,
        session: Uuid,
        options: ExportOptions,
    ) -> Result<(Uuid, JoinHandle<BulkOperation>), PipelineError> {
        let (handle, guard) = self.registry.begin(OperationKind::Export, session)?;
        let id = handle.id();
        info!("Export {} submitted by session {} ({:?})", id, session, options.format);

        let schema = Arc::clone(&self.schema);
        let store = Arc::clone(&self.store);
        let registry = self.registry.clone();
        let task_handle = handle.clone();

        let task = self.spawn(session, handle, guard, async move {
            run_export(&schema, store.as_ref(), &registry, &task_handle, &options).await
        });
        Ok((id, task))
    }

    fn start_bulk_edit(
        &self,
        session: Uuid,
        request: BulkEditRequest,
    ) -> Result<(Uuid, JoinHandle<BulkOperation>), PipelineError> {
        let (handle, guard) = self.registry.begin(OperationKind::BulkEdit, session)?;
        let id = handle.id();
        info!(
            "Bulk edit {} submitted by session {}: {} records",
            id,
            session,
            request.record_ids.len()
        );

        let schema = Arc::clone(&self.schema);
        let store = Arc::clone(&self.store);
        let task_handle = handle.clone();

        let task = self.spawn(session, handle, guard, async move {
            bulk_edit::execute(&request, &schema, store.as_ref(), &task_handle).await
        });
        Ok((id, task))
    }

    /// Run `work` in its own task. Whatever happens inside, the operation
    /// ends terminal, lands in history and its guard is released.
    fn spawn<F>(
        &self,
        session: Uuid,
        handle: OperationHandle,
        guard: OperationGuard,
        work: F,
    ) -> JoinHandle<BulkOperation>
    where
        F: Future<Output = Result<BulkOperation, PipelineError>> + Send + 'static,
    {
        let history = self.history.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let op = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(op)) => op,
                Ok(Err(e)) => {
                    error!("Operation {} failed: {}", handle.id(), e);
                    abort(&handle, OperationFailure::systemic(e.to_string()))
                }
                Err(_) => {
                    error!("Operation {} panicked", handle.id());
                    abort(&handle, OperationFailure::systemic("internal error"))
                }
            };
            history.record(session, &op);
            info!("{} {} finished: {}", op.kind.as_str(), op.id, op.status.as_str());
            op
        })
    }

    // ==========================================================================
    // Operation queries
    // ==========================================================================

    pub fn status(&self, id: Uuid, session: Uuid) -> Result<BulkOperation, PipelineError> {
        self.registry.status(id, session)
    }

    pub fn cancel(&self, id: Uuid, session: Uuid) -> Result<OperationActionResponse, PipelineError> {
        let cancelled = self.registry.cancel(id, session)?;
        let message = if cancelled {
            info!("Operation {} cancellation requested", id);
            "Cancellation requested"
        } else {
            "Operation already finished"
        };
        Ok(OperationActionResponse {
            success: cancelled,
            message: message.to_string(),
            operation_id: id,
        })
    }

    pub fn dismiss(&self, id: Uuid, session: Uuid) -> Result<OperationActionResponse, PipelineError> {
        let op = self.registry.dismiss(id, session)?;
        Ok(OperationActionResponse {
            success: true,
            message: format!("Dismissed {} operation", op.status.as_str()),
            operation_id: id,
        })
    }

    pub fn download(&self, id: Uuid, session: Uuid) -> Result<Arc<ExportArtifact>, PipelineError> {
        self.registry.artifact(id, session)
    }

    pub fn history(&self, session: Uuid, limit: usize) -> OperationHistoryResponse {
        self.history.recent_for_session(session, limit)
    }
}

fn submitted(id: Uuid, kind: OperationKind, message: &str) -> OperationSubmitResponse {
    OperationSubmitResponse {
        operation_id: id,
        kind,
        message: message.to_string(),
    }
}

async fn join(task: JoinHandle<BulkOperation>) -> Result<BulkOperation, PipelineError> {
    task.await
        .map_err(|e| PipelineError::Systemic(format!("operation task failed: {}", e)))
}

/// Force a terminal failed state from wherever the operation stopped
fn abort(handle: &OperationHandle, failure: OperationFailure) -> BulkOperation {
    if handle.status() == OperationStatus::Pending {
        let _ = handle.start(0);
    }
    if let Err(e) = handle.fail(failure) {
        warn!("Operation {} could not be marked failed: {}", handle.id(), e);
    }
    handle.snapshot()
}

async fn run_export(
    schema: &Schema,
    store: &dyn RecordStore,
    registry: &OperationRegistry,
    handle: &OperationHandle,
    options: &ExportOptions,
) -> Result<BulkOperation, PipelineError> {
    let filter = options.filters.clone().unwrap_or_default();
    let records = match store.list(&filter).await {
        Ok(records) => records,
        Err(e) => {
            warn!("Export {} aborted, record store unavailable: {}", handle.id(), e);
            handle.start(0)?;
            handle.fail(OperationFailure::systemic(e.to_string()))?;
            return Ok(handle.snapshot());
        }
    };

    let selected = export_serializer::select(&records, options);
    handle.start(selected.len() as u32)?;

    let mut on_progress = || {
        if let Err(e) = handle.record_success() {
            warn!("Export {} progress not recorded: {}", handle.id(), e);
        }
    };
    let result = export_serializer::serialize(&selected, schema, options, handle.token(), &mut on_progress);

    match result {
        Ok(bytes) => {
            let artifact = export_serializer::artifact(options.format, bytes, Utc::now());
            info!(
                "Export {} completed: {} records, {} bytes",
                handle.id(),
                selected.len(),
                artifact.bytes.len()
            );
            registry.store_artifact(handle.id(), artifact);
            handle.complete()?;
        }
        Err(ExportError::Cancelled) => {
            info!("Export {} cancelled", handle.id());
            handle.cancel()?;
        }
        Err(e) => {
            error!("Export {} failed: {}", handle.id(), e);
            handle.fail(OperationFailure::systemic(e.to_string()))?;
        }
    }
    Ok(handle.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::record_store::InMemoryRecordStore;
    use crate::types::property::fixtures;
    use crate::types::{ExportFilter, FailureCategory, FieldUpdate, PropertyStatus};

    fn service_with(store: Arc<InMemoryRecordStore>) -> BulkService {
        BulkService::new(store, OperationHistory::in_memory(), BulkLimits::default())
    }

    fn template_upload(service: &BulkService) -> UploadedFile {
        let template = service.template(ExportFormat::Csv).unwrap();
        UploadedFile::new(template.filename.clone(), template.bytes.clone())
    }

    #[tokio::test]
    async fn test_template_import_creates_records_and_history() {
        let store = Arc::new(InMemoryRecordStore::new());
        let service = service_with(store.clone());
        let session = Uuid::new_v4();

        let op = service.run_import(session, template_upload(&service)).await.unwrap();

        assert_eq!(op.status, OperationStatus::Completed);
        assert_eq!(op.success_count, 2);
        assert_eq!(store.len(), 2);
        let history = service.history(session, 10);
        assert_eq!(history.total, 1);
        assert_eq!(history.operations[0].id, op.id);
    }

    #[tokio::test]
    async fn test_preview_matches_import_classification() {
        let service = service_with(Arc::new(InMemoryRecordStore::new()));
        let preview = service.preview(&template_upload(&service)).unwrap();
        assert_eq!(preview.valid_rows, 2);
        assert_eq!(preview.invalid_rows, 0);
    }

    #[tokio::test]
    async fn test_rejected_upload_is_a_terminal_failed_operation() {
        let service = service_with(Arc::new(InMemoryRecordStore::new()));
        let session = Uuid::new_v4();

        let op = service
            .run_import(session, UploadedFile::new("notes.pdf", b"%PDF".to_vec()))
            .await
            .unwrap();

        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.processed_records, 0);
        assert_eq!(op.failure.unwrap().category, FailureCategory::InputRejected);
        assert_eq!(service.status(op.id, session).unwrap().status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn test_export_artifact_is_downloadable() {
        let store = Arc::new(InMemoryRecordStore::with_records(vec![
            fixtures::record("p-1", "Alpha", PropertyStatus::Active),
            fixtures::record("p-2", "Bravo", PropertyStatus::Inactive),
        ]));
        let service = service_with(store);
        let session = Uuid::new_v4();
        let options = ExportOptions {
            filters: Some(ExportFilter {
                status: Some(PropertyStatus::Active),
                ..Default::default()
            }),
            ..Default::default()
        };

        let (op, artifact) = service.run_export(session, options).await.unwrap();
        assert_eq!(op.status, OperationStatus::Completed);
        assert_eq!(op.total_records, 1);
        assert_eq!(op.progress, 100);
        let artifact = artifact.unwrap();
        assert!(artifact.filename.ends_with(".csv"));
        assert_eq!(String::from_utf8_lossy(&artifact.bytes).lines().count(), 2);

        let downloaded = service.download(op.id, session).unwrap();
        assert_eq!(downloaded.bytes, artifact.bytes);
        assert!(matches!(service.download(op.id, Uuid::new_v4()), Err(PipelineError::NotOwner(_))));
    }

    #[tokio::test]
    async fn test_export_with_store_offline_fails() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.set_offline(true);
        let service = service_with(store);
        let session = Uuid::new_v4();

        let (op, artifact) = service.run_export(session, ExportOptions::default()).await.unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.processed_records, 0);
        assert!(artifact.is_none());
        assert!(matches!(service.download(op.id, session), Err(PipelineError::NotReady(_))));
    }

    #[tokio::test]
    async fn test_bulk_edit_through_service() {
        let store = Arc::new(InMemoryRecordStore::with_records(vec![fixtures::record(
            "p-1",
            "Alpha",
            PropertyStatus::Active,
        )]));
        let service = service_with(store.clone());
        let op = service
            .run_bulk_edit(
                Uuid::new_v4(),
                BulkEditRequest {
                    record_ids: vec!["p-1".to_string()],
                    updates: vec![FieldUpdate::State("CA".to_string())],
                },
            )
            .await
            .unwrap();
        assert_eq!(op.status, OperationStatus::Completed);
        assert_eq!(store.records()[0].draft.state, "CA");
    }

    #[tokio::test]
    async fn test_dismiss_and_cancel_of_finished_operation() {
        let service = service_with(Arc::new(InMemoryRecordStore::new()));
        let session = Uuid::new_v4();
        let op = service.run_import(session, template_upload(&service)).await.unwrap();

        let cancel = service.cancel(op.id, session).unwrap();
        assert!(!cancel.success);

        let dismissed = service.dismiss(op.id, session).unwrap();
        assert!(dismissed.success);
        assert!(matches!(
            service.status(op.id, session),
            Err(PipelineError::OperationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_second_submit_in_same_session_is_busy() {
        let service = service_with(Arc::new(InMemoryRecordStore::new()));
        let session = Uuid::new_v4();

        // current-thread runtime: the first task has not run yet
        let first = tokio_test::assert_ok!(service.submit_import(session, template_upload(&service)));
        let busy = tokio_test::assert_err!(service.submit_export(session, ExportOptions::default()));
        assert_eq!(busy.code(), "SESSION_BUSY");

        // another session is unaffected
        tokio_test::assert_ok!(service.submit_export(Uuid::new_v4(), ExportOptions::default()));

        let mut updates = service.subscribe();
        loop {
            let update = tokio_test::assert_ok!(updates.recv().await);
            if update.operation_id == first.operation_id && update.operation.status.is_terminal() {
                break;
            }
        }
        tokio_test::assert_ok!(service.submit_export(session, ExportOptions::default()));
    }

    #[tokio::test]
    async fn test_ping_reports_store_state() {
        let store = Arc::new(InMemoryRecordStore::new());
        let service = service_with(store.clone());
        assert!(service.ping().await.store_available);
        store.set_offline(true);
        let pong = service.ping().await;
        assert!(!pong.store_available);
        assert_eq!(pong.store, "memory");
    }
}
