use chrono::Utc;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::RelayError;
use crate::models::{ClientMessage, InboundEnvelope, PermissionLevel, ServerMessage};
use crate::services::{PermissionOracle, SessionStore};
use crate::ws::{Connection, ConnectionHandle, ConnectionId, ConnectionRegistry, IdentityKind, RoomDirectory};

use super::disconnect::handle_disconnect;
use super::msg_auth_handler::handle_authenticate_message;
use super::msg_change_handler::handle_change_message;
use super::msg_cursor_handler::handle_cursor_message;
use super::msg_join_handler::handle_join_message;
use super::msg_leave_handler::handle_leave_message;
use super::msg_ping_handler::handle_ping_message;
use super::msg_presence_handler::handle_presence_message;

/// Behaviour switches for the router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Echo every accepted `document-change` back to its sender with `isAck: true`.
    pub ack_document_changes: bool,
    /// Text of the `connected` greeting.
    pub welcome_message: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            ack_document_changes: false,
            welcome_message: "Connected to collaboration server".to_string(),
        }
    }
}

/// Entry point for every inbound frame of every connection.
///
/// Owns no transport: it only needs a [`ConnectionHandle`] per connection,
/// so the same router serves the axum websocket and the tests.
pub struct MessageRouter {
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) rooms: Arc<RoomDirectory>,
    pub(crate) permissions: Arc<dyn PermissionOracle>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) config: RouterConfig,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomDirectory>,
        permissions: Arc<dyn PermissionOracle>,
        sessions: Arc<dyn SessionStore>,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            rooms,
            permissions,
            sessions,
            config,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    /// Register a new transport connection and greet it.
    pub fn connect(&self, handle: ConnectionHandle) {
        let id = handle.id();
        self.registry.on_connect(handle);
        self.reply(
            id,
            ServerMessage::Connected {
                message: self.config.welcome_message.clone(),
                connection_id: id,
                timestamp: Utc::now(),
            },
        );
    }

    /// Handle one text frame. Never fails: any error, including a panic in a
    /// handler, is reported back to the connection as an `error` message.
    pub async fn handle_text(&self, connection_id: ConnectionId, text: &str) {
        let outcome = AssertUnwindSafe(self.process(connection_id, text))
            .catch_unwind()
            .await;

        let result = outcome.unwrap_or_else(|panic| {
            let reason = panic_reason(panic.as_ref());
            error!("Handler panicked for connection {}: {}", connection_id, reason);
            Err(RelayError::Internal(reason))
        });

        if let Err(e) = result {
            match &e {
                RelayError::Internal(_) => error!("Connection {}: {}", connection_id, e),
                _ => warn!("Connection {}: {}", connection_id, e),
            }
            self.reply(connection_id, ServerMessage::error(e.to_string()));
        }
    }

    async fn process(&self, connection_id: ConnectionId, text: &str) -> Result<(), RelayError> {
        let envelope = InboundEnvelope::parse(text)?;

        if envelope.msg_type != "authenticate" && !self.registry.is_authenticated(connection_id) {
            return Err(RelayError::NotAuthenticated);
        }

        let msg = ClientMessage::from_envelope(envelope)?;
        self.dispatch(connection_id, msg).await
    }

    /// Route a parsed message to its handler.
    pub async fn dispatch(&self, connection_id: ConnectionId, msg: ClientMessage) -> Result<(), RelayError> {
        if !msg.is_authenticate() && !self.registry.is_authenticated(connection_id) {
            return Err(RelayError::NotAuthenticated);
        }
        debug!("Connection {} sent {}", connection_id, msg.kind());

        match msg {
            ClientMessage::Authenticate(claim) => handle_authenticate_message(self, connection_id, claim).await,
            ClientMessage::JoinDocument(join) => handle_join_message(self, connection_id, join).await,
            ClientMessage::LeaveDocument => handle_leave_message(self, connection_id).await,
            ClientMessage::DocumentChange(change) => handle_change_message(self, connection_id, change).await,
            ClientMessage::CursorUpdate(cursor) => handle_cursor_message(self, connection_id, cursor).await,
            ClientMessage::UserPresence(presence) => handle_presence_message(self, connection_id, presence).await,
            ClientMessage::Ping => handle_ping_message(self, connection_id).await,
        }
    }

    /// Transport closed: clean up everything the connection held.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        handle_disconnect(self, connection_id).await;
    }

    pub(crate) fn reply(&self, connection_id: ConnectionId, msg: ServerMessage) {
        if !self.registry.send(connection_id, msg) {
            debug!("Dropped reply to closed connection {}", connection_id);
        }
    }

    pub(crate) fn require_connection(&self, connection_id: ConnectionId) -> Result<Connection, RelayError> {
        self.registry.get(connection_id).ok_or(RelayError::NotAuthenticated)
    }

    /// Check that `conn` holds at least `required` on `document_id`.
    ///
    /// Guests are confined to the document their share token was issued
    /// for and never exceed viewer.
    pub(crate) async fn check_access(
        &self,
        conn: &Connection,
        document_id: &str,
        required: PermissionLevel,
    ) -> Result<(), RelayError> {
        let allowed = match &conn.identity {
            IdentityKind::Registered => {
                self.permissions
                    .check_document_permission(document_id, &conn.user_email, required)
                    .await?
                    .has_access
            }
            IdentityKind::Guest { share_token, document_id: guest_document } => {
                if guest_document != document_id || !PermissionLevel::Viewer.satisfies(required) {
                    false
                } else {
                    self.permissions
                        .validate_guest_access(document_id, share_token)
                        .await?
                        .has_access
                }
            }
        };

        if allowed {
            Ok(())
        } else {
            warn!(
                "{} lacks {} access to document {}",
                conn.user_email, required, document_id
            );
            Err(RelayError::PermissionDenied { required })
        }
    }

    /// The room a cursor or presence event goes to: the connection's own.
    /// A `documentId` naming any other document is refused.
    pub(crate) fn resolve_room(&self, conn: &Connection, requested: Option<String>) -> Result<String, RelayError> {
        match (requested, &conn.current_document_id) {
            (None, Some(current)) => Ok(current.clone()),
            (Some(requested), Some(current)) if requested == *current => Ok(requested),
            (None, None) => Err(RelayError::malformed("documentId is required")),
            (Some(document_id), _) => {
                warn!("{} is not in document {}", conn.user_email, document_id);
                Err(RelayError::NotInDocument { document_id })
            }
        }
    }

    /// Session bookkeeping is not allowed to disturb the collaboration itself.
    pub(crate) async fn remove_session_best_effort(&self, session_id: Uuid) {
        if let Err(e) = self.sessions.remove_session(session_id).await {
            error!("Failed to remove session {}: {}", session_id, e);
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
