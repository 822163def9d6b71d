//! NATS message handlers

pub mod export;
pub mod import;
pub mod operations;
pub mod ping;

use anyhow::Result;
use async_nats::{Client, Subject};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::select;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::services::bulk::BulkService;
use crate::types::{ErrorResponse, OperationStatusUpdate, Request, SuccessResponse};

/// Prefix of the per-operation status subjects
pub const STATUS_SUBJECT_PREFIX: &str = "bulk.operation.status";

pub fn status_subject(operation_id: Uuid) -> String {
    format!("{}.{}", STATUS_SUBJECT_PREFIX, operation_id)
}

/// Decode a request envelope. Replies INVALID_REQUEST and returns `None`
/// when the payload does not parse.
pub(crate) async fn parse_request<T: DeserializeOwned>(
    client: &Client,
    reply: &Subject,
    payload: &[u8],
) -> Result<Option<Request<T>>> {
    match serde_json::from_slice(payload) {
        Ok(request) => Ok(Some(request)),
        Err(e) => {
            warn!("Failed to parse request on {}: {}", reply, e);
            let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
            let _ = client.publish(reply.clone(), serde_json::to_vec(&error)?.into()).await;
            Ok(None)
        }
    }
}

/// Reply with either the payload or the pipeline error mapped to its code
pub(crate) async fn respond<T: Serialize>(
    client: &Client,
    reply: Subject,
    request_id: Uuid,
    result: Result<T, PipelineError>,
) -> Result<()> {
    let bytes = match result {
        Ok(payload) => serde_json::to_vec(&SuccessResponse::new(request_id, payload))?,
        Err(e) => {
            debug!("Request {} failed: {}", request_id, e);
            serde_json::to_vec(&ErrorResponse::from_pipeline(request_id, &e))?
        }
    };
    let _ = client.publish(reply, bytes.into()).await;
    Ok(())
}

/// Republish every status snapshot on `bulk.operation.status.{id}`
async fn forward_status_updates(
    client: Client,
    mut updates: broadcast::Receiver<OperationStatusUpdate>,
) -> Result<()> {
    loop {
        match updates.recv().await {
            Ok(update) => {
                let subject = status_subject(update.operation_id);
                if let Err(e) = client.publish(subject, serde_json::to_vec(&update)?.into()).await {
                    warn!("Failed to publish status of {}: {}", update.operation_id, e);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Status publisher lagged, {} snapshots skipped", skipped);
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

/// Start all message handlers
pub async fn start_handlers(client: Client, service: BulkService) -> Result<()> {
    info!("Starting message handlers...");

    let ping_sub = client.subscribe("bulk.ping").await?;
    let template_sub = client.subscribe("bulk.template").await?;
    let import_preview_sub = client.subscribe("bulk.import.preview").await?;
    let import_submit_sub = client.subscribe("bulk.import.submit").await?;
    let export_submit_sub = client.subscribe("bulk.export.submit").await?;
    let export_download_sub = client.subscribe("bulk.export.download").await?;
    let edit_submit_sub = client.subscribe("bulk.edit.submit").await?;
    let status_sub = client.subscribe("bulk.operation.status").await?;
    let cancel_sub = client.subscribe("bulk.operation.cancel").await?;
    let dismiss_sub = client.subscribe("bulk.operation.dismiss").await?;
    let history_sub = client.subscribe("bulk.operation.history").await?;

    info!("Subscribed to NATS subjects");

    let status_updates = service.subscribe();

    let ping_handle = tokio::spawn(ping::handle_ping(client.clone(), ping_sub, service.clone()));
    let template_handle = tokio::spawn(export::handle_template(client.clone(), template_sub, service.clone()));
    let import_preview_handle = tokio::spawn(import::handle_import_preview(
        client.clone(),
        import_preview_sub,
        service.clone(),
    ));
    let import_submit_handle = tokio::spawn(import::handle_import_submit(
        client.clone(),
        import_submit_sub,
        service.clone(),
    ));
    let export_submit_handle = tokio::spawn(export::handle_export_submit(
        client.clone(),
        export_submit_sub,
        service.clone(),
    ));
    let export_download_handle = tokio::spawn(export::handle_export_download(
        client.clone(),
        export_download_sub,
        service.clone(),
    ));
    let edit_submit_handle = tokio::spawn(operations::handle_bulk_edit_submit(
        client.clone(),
        edit_submit_sub,
        service.clone(),
    ));
    let status_handle = tokio::spawn(operations::handle_status(client.clone(), status_sub, service.clone()));
    let cancel_handle = tokio::spawn(operations::handle_cancel(client.clone(), cancel_sub, service.clone()));
    let dismiss_handle = tokio::spawn(operations::handle_dismiss(client.clone(), dismiss_sub, service.clone()));
    let history_handle = tokio::spawn(operations::handle_history(client.clone(), history_sub, service));
    let publisher_handle = tokio::spawn(forward_status_updates(client, status_updates));

    // Wait for any handler to finish (which means an error occurred)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = template_handle => {
            error!("Template handler finished: {:?}", result);
        }
        result = import_preview_handle => {
            error!("Import preview handler finished: {:?}", result);
        }
        result = import_submit_handle => {
            error!("Import submit handler finished: {:?}", result);
        }
        result = export_submit_handle => {
            error!("Export submit handler finished: {:?}", result);
        }
        result = export_download_handle => {
            error!("Export download handler finished: {:?}", result);
        }
        result = edit_submit_handle => {
            error!("Bulk edit submit handler finished: {:?}", result);
        }
        result = status_handle => {
            error!("Operation status handler finished: {:?}", result);
        }
        result = cancel_handle => {
            error!("Operation cancel handler finished: {:?}", result);
        }
        result = dismiss_handle => {
            error!("Operation dismiss handler finished: {:?}", result);
        }
        result = history_handle => {
            error!("Operation history handler finished: {:?}", result);
        }
        result = publisher_handle => {
            error!("Status publisher finished: {:?}", result);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_subject_is_per_operation() {
        let id = Uuid::nil();
        assert_eq!(
            status_subject(id),
            "bulk.operation.status.00000000-0000-0000-0000-000000000000"
        );
    }
}
