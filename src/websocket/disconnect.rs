use chrono::Utc;
use tracing::{debug, info};

use crate::models::ServerMessage;
use crate::ws::ConnectionId;
use super::router::MessageRouter;

/// Clean up after a closed transport. Running it twice is harmless: the
/// second call finds neither a record nor a room membership.
pub async fn handle_disconnect(router: &MessageRouter, connection_id: ConnectionId) {
    let Some(record) = router.registry.forget(connection_id) else {
        debug!("Connection {} closed without an authenticated record", connection_id);
        return;
    };

    if let Some(document_id) = &record.current_document_id {
        if router.rooms.leave(document_id, connection_id) {
            let left = ServerMessage::UserLeft {
                user: record.user_fields(),
                timestamp: Utc::now(),
            };
            let notified = router
                .rooms
                .broadcast(document_id, &left, Some(connection_id), &router.registry);
            info!(
                "{} disconnected from document {} ({} peers notified)",
                record.user_email, document_id, notified
            );
        }
    }

    if let Some(session_id) = record.session_id {
        router.remove_session_best_effort(session_id).await;
    }

    info!("Connection {} cleaned up", connection_id);
}
