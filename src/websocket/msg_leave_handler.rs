use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RelayError;
use crate::models::ServerMessage;
use crate::ws::ConnectionId;
use super::router::MessageRouter;

/// Handle a `leave-document` message. The leaver gets no reply.
pub async fn handle_leave_message(router: &MessageRouter, connection_id: ConnectionId) -> Result<(), RelayError> {
    router.require_connection(connection_id)?;
    leave_current_room(router, connection_id).await;
    Ok(())
}

/// Take the connection out of its room, tell the remaining members, and
/// drop its session. Safe to call when the connection is in no room.
pub(crate) async fn leave_current_room(router: &MessageRouter, connection_id: ConnectionId) {
    if let Some(session_id) = vacate_room(router, connection_id) {
        router.remove_session_best_effort(session_id).await;
    }
}

/// Synchronous half of a leave: membership and the `user-left` broadcast.
/// Returns the session the connection held, for the caller to remove.
pub(crate) fn vacate_room(router: &MessageRouter, connection_id: ConnectionId) -> Option<Uuid> {
    let (document_id, session_id) = router.registry.leave_document(connection_id);
    let user = router.registry.get(connection_id).map(|conn| conn.user_fields());

    match (document_id, user) {
        (Some(document_id), Some(user)) => {
            if router.rooms.leave(&document_id, connection_id) {
                let left = ServerMessage::UserLeft {
                    user,
                    timestamp: Utc::now(),
                };
                router
                    .rooms
                    .broadcast(&document_id, &left, Some(connection_id), &router.registry);
                info!("Connection {} left document {}", connection_id, document_id);
            }
        }
        _ => debug!("Connection {} is not in a document", connection_id),
    }

    session_id
}
