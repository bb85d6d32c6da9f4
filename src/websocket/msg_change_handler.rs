use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::error::RelayError;
use crate::models::{ChangeMessage, PermissionLevel, ServerMessage};
use crate::ws::ConnectionId;
use super::router::MessageRouter;

/// Handle a `document-change` message: check edit rights, then rebroadcast
/// the payload untouched to the rest of the room.
pub async fn handle_change_message(
    router: &MessageRouter,
    connection_id: ConnectionId,
    change_msg: ChangeMessage,
) -> Result<(), RelayError> {
    let conn = router.require_connection(connection_id)?;
    let ChangeMessage { document_id, data } = change_msg;

    router
        .check_access(&conn, &document_id, PermissionLevel::Editor)
        .await?;

    log_operation(&document_id, &conn.user_email, &data);

    let timestamp = Utc::now();
    let mut change = ServerMessage::DocumentChange {
        user_id: conn.user_id.clone(),
        user_email: conn.user_email.clone(),
        data,
        timestamp,
        is_ack: None,
    };
    let delivered = router
        .rooms
        .broadcast(&document_id, &change, Some(connection_id), &router.registry);

    if router.config.ack_document_changes {
        if let ServerMessage::DocumentChange { is_ack, .. } = &mut change {
            *is_ack = Some(true);
        }
        router.reply(connection_id, change);
    }

    debug!("Change on {} relayed to {} peers", document_id, delivered);
    Ok(())
}

// The operation is opaque; its shape is only read for logging.
fn log_operation(document_id: &str, user_email: &str, data: &Value) {
    let Some(operation) = data.get("operation") else {
        debug!("Change from {} on {} without operation", user_email, document_id);
        return;
    };
    let op_type = operation.get("type").and_then(Value::as_str).unwrap_or("?");
    let position = operation.get("position").map(Value::to_string).unwrap_or_default();
    let length = operation.get("length").map(Value::to_string).unwrap_or_default();
    debug!(
        "Change from {} on {}: type={} position={} length={}",
        user_email, document_id, op_type, position, length
    );
}
