use chrono::Utc;
use tracing::warn;

use crate::error::RelayError;
use crate::models::{RelayMessage, ServerMessage};
use crate::ws::ConnectionId;
use super::router::MessageRouter;

/// Handle a `cursor-update` message. Only the sender's own room is reachable;
/// no permission level is checked.
pub async fn handle_cursor_message(
    router: &MessageRouter,
    connection_id: ConnectionId,
    cursor_msg: RelayMessage,
) -> Result<(), RelayError> {
    let conn = router.require_connection(connection_id)?;
    let document_id = router.resolve_room(&conn, cursor_msg.document_id)?;

    let cursor = ServerMessage::CursorUpdate {
        user: conn.user_fields(),
        data: cursor_msg.data.clone(),
        timestamp: Utc::now(),
    };
    router
        .rooms
        .broadcast(&document_id, &cursor, Some(connection_id), &router.registry);

    // Activity tracking runs after the broadcast so a slow store never delays peers.
    if let Some(session_id) = conn.session_id {
        if let Err(e) = router
            .sessions
            .update_session_activity(session_id, Some(&cursor_msg.data))
            .await
        {
            warn!("Failed to update activity for session {}: {}", session_id, e);
        }
    }
    Ok(())
}
