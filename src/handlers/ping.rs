//! Ping handler for health checks

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{debug, error};
use uuid::Uuid;

use crate::services::bulk::BulkService;
use crate::types::{Request, SuccessResponse};

/// Handle ping messages. Any payload is accepted; the request id is echoed
/// when the envelope parses.
pub async fn handle_ping(client: Client, mut subscriber: Subscriber, service: BulkService) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received ping message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                error!("Ping message without reply subject");
                continue;
            }
        };

        let request_id = serde_json::from_slice::<Request<serde_json::Value>>(&msg.payload)
            .map(|request| request.id)
            .unwrap_or_else(|_| Uuid::nil());

        let response = SuccessResponse::new(request_id, service.ping().await);
        client.publish(reply, serde_json::to_vec(&response)?.into()).await?;

        debug!("Sent pong response");
    }

    Ok(())
}
