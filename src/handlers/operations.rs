//! Operation lifecycle handlers: bulk edit submit, status, cancel, dismiss
//! and history.

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;

use crate::handlers::{parse_request, respond};
use crate::services::bulk::BulkService;
use crate::types::{BulkEditRequest, HistoryRequest, OperationRef};

/// Handle bulk.edit.submit requests
pub async fn handle_bulk_edit_submit(
    client: Client,
    mut subscriber: Subscriber,
    service: BulkService,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };
        let Some(request) = parse_request::<BulkEditRequest>(&client, &reply, &msg.payload).await? else {
            continue;
        };

        let result = service.submit_bulk_edit(request.session_id, request.payload);
        respond(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle bulk.operation.status requests
pub async fn handle_status(client: Client, mut subscriber: Subscriber, service: BulkService) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };
        let Some(request) = parse_request::<OperationRef>(&client, &reply, &msg.payload).await? else {
            continue;
        };

        let result = service.status(request.payload.operation_id, request.session_id);
        respond(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle bulk.operation.cancel requests
pub async fn handle_cancel(client: Client, mut subscriber: Subscriber, service: BulkService) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };
        let Some(request) = parse_request::<OperationRef>(&client, &reply, &msg.payload).await? else {
            continue;
        };

        let result = service.cancel(request.payload.operation_id, request.session_id);
        respond(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle bulk.operation.dismiss requests
pub async fn handle_dismiss(client: Client, mut subscriber: Subscriber, service: BulkService) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };
        let Some(request) = parse_request::<OperationRef>(&client, &reply, &msg.payload).await? else {
            continue;
        };

        let result = service.dismiss(request.payload.operation_id, request.session_id);
        respond(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle bulk.operation.history requests
pub async fn handle_history(client: Client, mut subscriber: Subscriber, service: BulkService) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };
        let Some(request) = parse_request::<HistoryRequest>(&client, &reply, &msg.payload).await? else {
            continue;
        };

        let history = service.history(request.session_id, request.payload.limit);
        respond(&client, reply, request.id, Ok(history)).await?;
    }

    Ok(())
}
