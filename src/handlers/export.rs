//! Export and template download handlers.

use anyhow::Result;
use async_nats::{Client, Subscriber};
use base64::Engine;
use futures::StreamExt;
use tracing::info;

use crate::handlers::{parse_request, respond};
use crate::services::bulk::BulkService;
use crate::types::{ExportArtifact, ExportOptions, FileResponse, OperationRef, TemplateRequest};

/// Base64 file payload for a generated artifact
pub fn file_response(artifact: &ExportArtifact) -> FileResponse {
    FileResponse {
        filename: artifact.filename.clone(),
        content_type: artifact.content_type.clone(),
        file_base64: base64::engine::general_purpose::STANDARD.encode(&artifact.bytes),
        size_bytes: artifact.bytes.len() as u64,
    }
}

/// Handle bulk.template requests
pub async fn handle_template(client: Client, mut subscriber: Subscriber, service: BulkService) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };
        let Some(request) = parse_request::<TemplateRequest>(&client, &reply, &msg.payload).await? else {
            continue;
        };

        let result = service
            .template(request.payload.format)
            .map(|artifact| file_response(&artifact));
        respond(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle bulk.export.submit requests
pub async fn handle_export_submit(
    client: Client,
    mut subscriber: Subscriber,
    service: BulkService,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };
        let Some(request) = parse_request::<ExportOptions>(&client, &reply, &msg.payload).await? else {
            continue;
        };

        let result = service.submit_export(request.session_id, request.payload);
        respond(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle bulk.export.download requests
pub async fn handle_export_download(
    client: Client,
    mut subscriber: Subscriber,
    service: BulkService,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };
        let Some(request) = parse_request::<OperationRef>(&client, &reply, &msg.payload).await? else {
            continue;
        };

        let operation_id = request.payload.operation_id;
        let result = service
            .download(operation_id, request.session_id)
            .map(|artifact| file_response(&artifact));
        if let Ok(ref file) = result {
            info!("Export {} downloaded ({} bytes)", operation_id, file.size_bytes);
        }
        respond(&client, reply, request.id, result).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_response_encodes_bytes() {
        let artifact = ExportArtifact {
            filename: "properties.csv".to_string(),
            content_type: "text/csv; charset=utf-8".to_string(),
            bytes: b"name\n".to_vec(),
        };
        let file = file_response(&artifact);
        assert_eq!(file.size_bytes, 5);
        assert_eq!(
            base64::engine::general_purpose::STANDARD.decode(&file.file_base64).unwrap(),
            b"name\n"
        );
    }
}
