use chrono::Utc;
use tracing::trace;

use crate::error::RelayError;
use crate::models::ServerMessage;
use crate::ws::ConnectionId;
use super::router::MessageRouter;

/// Handle a `ping` message - reply with a pong.
pub async fn handle_ping_message(router: &MessageRouter, connection_id: ConnectionId) -> Result<(), RelayError> {
    trace!("Ping from connection {}", connection_id);
    router.reply(connection_id, ServerMessage::Pong { timestamp: Utc::now() });
    Ok(())
}
