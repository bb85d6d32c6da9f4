use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RelayError;
use crate::models::{JoinMessage, PermissionLevel, ServerMessage, SessionCreatedData, UserFields};
use crate::ws::ConnectionId;
use super::msg_leave_handler::vacate_room;
use super::router::MessageRouter;

/// Handle a `join-document` message.
pub async fn handle_join_message(
    router: &MessageRouter,
    connection_id: ConnectionId,
    join_msg: JoinMessage,
) -> Result<(), RelayError> {
    let conn = router.require_connection(connection_id)?;
    let document_id = join_msg.document_id;

    router
        .check_access(&conn, &document_id, PermissionLevel::Viewer)
        .await?;

    // Already in this room: confirm again, peers see nothing.
    if let (Some(current), Some(session_id)) = (&conn.current_document_id, conn.session_id) {
        if *current == document_id {
            debug!("{} re-joined document {}", conn.user_email, document_id);
            confirm_join(router, connection_id, conn.user_fields(), session_id);
            return Ok(());
        }
    }

    // A failed create leaves the connection where it was.
    let session = router
        .sessions
        .create_session(
            &document_id,
            &conn.user_id,
            &conn.user_email,
            conn.user_name.as_deref(),
        )
        .await?;

    // No await from here until the old session is dropped: leaving the
    // previous room, membership and replies happen in one step.
    let previous_session = vacate_room(router, connection_id);
    if !router.registry.enter_document(connection_id, &document_id, session.id) {
        router.remove_session_best_effort(session.id).await;
        return Err(RelayError::NotAuthenticated);
    }
    router.rooms.join(&document_id, connection_id);

    let joined = confirm_join(router, connection_id, conn.user_fields(), session.id);
    let notified = router
        .rooms
        .broadcast(&document_id, &joined, Some(connection_id), &router.registry);

    info!(
        "{} joined document {} with session {} ({} peers notified)",
        conn.user_email, document_id, session.id, notified
    );

    if let Some(previous_session) = previous_session {
        router.remove_session_best_effort(previous_session).await;
    }
    Ok(())
}

/// Send the joiner `user-joined` then `session-created`; returns the
/// `user-joined` message for the peers.
fn confirm_join(
    router: &MessageRouter,
    connection_id: ConnectionId,
    user: UserFields,
    session_id: Uuid,
) -> ServerMessage {
    let joined = ServerMessage::UserJoined {
        user,
        session_id,
        timestamp: Utc::now(),
    };
    router.reply(connection_id, joined.clone());
    router.reply(
        connection_id,
        ServerMessage::SessionCreated {
            data: SessionCreatedData { session_id },
            timestamp: Utc::now(),
        },
    );
    joined
}
