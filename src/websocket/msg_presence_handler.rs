use chrono::Utc;

use crate::error::RelayError;
use crate::models::{RelayMessage, ServerMessage};
use crate::ws::ConnectionId;
use super::router::MessageRouter;

/// Handle a `user-presence` message: relay it to the room, nothing stored.
pub async fn handle_presence_message(
    router: &MessageRouter,
    connection_id: ConnectionId,
    presence_msg: RelayMessage,
) -> Result<(), RelayError> {
    let conn = router.require_connection(connection_id)?;
    let document_id = router.resolve_room(&conn, presence_msg.document_id)?;

    let presence = ServerMessage::UserPresence {
        user: conn.user_fields(),
        data: presence_msg.data,
        timestamp: Utc::now(),
    };
    router
        .rooms
        .broadcast(&document_id, &presence, Some(connection_id), &router.registry);
    Ok(())
}
