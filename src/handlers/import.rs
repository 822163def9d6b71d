//! Import handlers: preview and submit of uploaded files.

use anyhow::Result;
use async_nats::{Client, Subscriber};
use base64::Engine;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::{InputRejection, PipelineError};
use crate::handlers::{parse_request, respond};
use crate::services::bulk::BulkService;
use crate::services::upload::UploadedFile;
use crate::types::UploadPayload;

/// Decode the transported file
pub fn decode_upload(payload: UploadPayload) -> Result<UploadedFile, PipelineError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.file_base64.trim())
        .map_err(|e| InputRejection::Unparseable(format!("file is not valid base64: {}", e)))?;
    Ok(UploadedFile::new(payload.filename, bytes))
}

/// Handle bulk.import.preview requests
pub async fn handle_import_preview(
    client: Client,
    mut subscriber: Subscriber,
    service: BulkService,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };
        let Some(request) = parse_request::<UploadPayload>(&client, &reply, &msg.payload).await? else {
            continue;
        };

        debug!("Preview of {} for session {}", request.payload.filename, request.session_id);
        let preview = tokio::task::spawn_blocking({
            let service = service.clone();
            move || {
                let file = decode_upload(request.payload)?;
                service.preview(&file)
            }
        })
        .await
        .unwrap_or_else(|e| Err(PipelineError::Systemic(format!("preview task failed: {}", e))));

        if let Err(ref e) = preview {
            warn!("Preview rejected: {}", e);
        }
        respond(&client, reply, request.id, preview).await?;
    }

    Ok(())
}

/// Handle bulk.import.submit requests
pub async fn handle_import_submit(
    client: Client,
    mut subscriber: Subscriber,
    service: BulkService,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };
        let Some(request) = parse_request::<UploadPayload>(&client, &reply, &msg.payload).await? else {
            continue;
        };

        let session = request.session_id;
        let result = decode_upload(request.payload).and_then(|file| service.submit_import(session, file));
        respond(&client, reply, request.id, result).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_decode_upload() {
        let payload = UploadPayload {
            filename: "props.csv".to_string(),
            file_base64: base64::engine::general_purpose::STANDARD.encode(b"name\nA\n"),
        };
        let file = decode_upload(payload).unwrap();
        assert_eq!(file.filename, "props.csv");
        assert_eq!(file.bytes, b"name\nA\n");
    }

    #[test]
    fn test_decode_upload_rejects_bad_base64() {
        let payload = UploadPayload {
            filename: "props.csv".to_string(),
            file_base64: "%%%".to_string(),
        };
        let err = decode_upload(payload).unwrap_err();
        assert_eq!(err.code(), "INPUT_REJECTED");
    }

    #[test]
    fn test_request_id_survives_into_error_envelope() {
        let request_id = Uuid::new_v4();
        let error = crate::types::ErrorResponse::from_pipeline(request_id, &PipelineError::NotReady(Uuid::nil()));
        assert_eq!(error.id, request_id);
        assert_eq!(error.error.code, "NOT_READY");
    }
}
