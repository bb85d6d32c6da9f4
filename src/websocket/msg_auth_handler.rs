use chrono::Utc;
use tracing::info;

use crate::error::RelayError;
use crate::models::{AuthClaim, ServerMessage};
use crate::ws::ConnectionId;
use super::router::MessageRouter;

/// Handle an `authenticate` message.
///
/// A failed attempt leaves the connection unauthenticated but open.
pub async fn handle_authenticate_message(
    router: &MessageRouter,
    connection_id: ConnectionId,
    claim: AuthClaim,
) -> Result<(), RelayError> {
    let record = router
        .registry
        .authenticate(connection_id, claim, router.permissions.as_ref())
        .await?;

    info!("Authenticated {} on connection {}", record.user_id, connection_id);
    router.reply(
        connection_id,
        ServerMessage::Authenticated {
            user: record.user_fields(),
            share_token: record.share_token().map(str::to_string),
            timestamp: Utc::now(),
        },
    );
    Ok(())
}
