use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RelayError;
use crate::models::{AuthClaim, ServerMessage, UserFields};
use crate::services::PermissionOracle;

pub type ConnectionId = Uuid;

/// Sending half of one live transport connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: UnboundedSender<ServerMessage>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The writer side drops its receiver when the socket goes away.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn send(&self, msg: ServerMessage) -> bool {
        self.tx.send(msg).is_ok()
    }
}

/// How a connection proved who it is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityKind {
    Registered,
    Guest {
        share_token: String,
        document_id: String,
    },
}

/// An authenticated connection.
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: String,
    pub user_email: String,
    pub user_name: Option<String>,
    pub user_image: Option<String>,
    pub identity: IdentityKind,
    pub current_document_id: Option<String>,
    pub session_id: Option<Uuid>,
}

impl Connection {
    pub fn is_guest(&self) -> bool {
        matches!(self.identity, IdentityKind::Guest { .. })
    }

    pub fn share_token(&self) -> Option<&str> {
        match &self.identity {
            IdentityKind::Guest { share_token, .. } => Some(share_token),
            IdentityKind::Registered => None,
        }
    }

    pub fn user_fields(&self) -> UserFields {
        UserFields {
            user_id: self.user_id.clone(),
            user_email: self.user_email.clone(),
            user_name: self.user_name.clone(),
            user_image: self.user_image.clone(),
        }
    }
}

/// `guest_*@example.com`, where `*` may be empty.
pub fn is_guest_email(email: &str) -> bool {
    email.len() >= "guest_@example.com".len()
        && email.starts_with("guest_")
        && email.ends_with("@example.com")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Default)]
struct RegistryState {
    handles: HashMap<ConnectionId, ConnectionHandle>,
    records: HashMap<ConnectionId, Connection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub connections: usize,
    pub authenticated: usize,
}

/// Live connections and their authenticated identities.
///
/// Every method is synchronous; callers never hold the lock across an await.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a transport connection. No identity is known yet.
    pub fn on_connect(&self, handle: ConnectionHandle) {
        debug!("Registering connection {}", handle.id());
        self.lock().handles.insert(handle.id(), handle);
    }

    /// Run the authentication handshake for `connection_id` and store the
    /// resulting record.
    ///
    /// A repeated authenticate replaces the identity of the previous record
    /// but keeps its document and session, so that cleanup still finds the
    /// room the connection sits in.
    pub async fn authenticate(
        &self,
        connection_id: ConnectionId,
        claim: AuthClaim,
        oracle: &dyn PermissionOracle,
    ) -> Result<Connection, RelayError> {
        let (Some(user_id), Some(user_email)) = (non_blank(claim.user_id), non_blank(claim.user_email)) else {
            return Err(RelayError::MissingCredentials);
        };

        let identity = if is_guest_email(&user_email) {
            let (Some(share_token), Some(document_id)) =
                (non_blank(claim.share_token), non_blank(claim.document_id))
            else {
                warn!("Guest {} authenticated without share token or document", user_email);
                return Err(RelayError::GuestAccessDenied);
            };

            let access = oracle.validate_guest_access(&document_id, &share_token).await?;
            if !access.has_access {
                warn!("Guest {} denied access to {}", user_email, document_id);
                return Err(RelayError::GuestAccessDenied);
            }
            IdentityKind::Guest {
                share_token,
                document_id,
            }
        } else {
            if !oracle.validate_user(&user_email).await? {
                warn!("Rejected unknown user {}", user_email);
                return Err(RelayError::InvalidUser);
            }
            IdentityKind::Registered
        };

        let mut record = Connection {
            id: connection_id,
            user_id,
            user_email,
            user_name: non_blank(claim.user_name),
            user_image: non_blank(claim.user_image),
            identity,
            current_document_id: None,
            session_id: None,
        };

        let mut state = self.lock();
        if let Some(previous) = state.records.get(&connection_id) {
            record.current_document_id = previous.current_document_id.clone();
            record.session_id = previous.session_id;
        }
        state.records.insert(connection_id, record.clone());
        drop(state);

        info!(
            "Connection {} authenticated as {} ({})",
            connection_id,
            record.user_email,
            if record.is_guest() { "guest" } else { "registered" }
        );
        Ok(record)
    }

    pub fn is_authenticated(&self, connection_id: ConnectionId) -> bool {
        self.lock().records.contains_key(&connection_id)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<Connection> {
        self.lock().records.get(&connection_id).cloned()
    }

    pub fn handle(&self, connection_id: ConnectionId) -> Option<ConnectionHandle> {
        self.lock().handles.get(&connection_id).cloned()
    }

    /// Send to one connection. Returns false if it is unknown or closed.
    pub fn send(&self, connection_id: ConnectionId, msg: ServerMessage) -> bool {
        match self.handle(connection_id) {
            Some(handle) => handle.send(msg),
            None => false,
        }
    }

    /// Record the document and session a connection has joined.
    pub fn enter_document(&self, connection_id: ConnectionId, document_id: &str, session_id: Uuid) -> bool {
        let mut state = self.lock();
        match state.records.get_mut(&connection_id) {
            Some(record) => {
                record.current_document_id = Some(document_id.to_string());
                record.session_id = Some(session_id);
                true
            }
            None => false,
        }
    }

    /// Clear and return the document and session of a connection.
    pub fn leave_document(&self, connection_id: ConnectionId) -> (Option<String>, Option<Uuid>) {
        let mut state = self.lock();
        match state.records.get_mut(&connection_id) {
            Some(record) => (record.current_document_id.take(), record.session_id.take()),
            None => (None, None),
        }
    }

    /// Drop everything known about a connection, returning its record.
    pub fn forget(&self, connection_id: ConnectionId) -> Option<Connection> {
        let mut state = self.lock();
        state.handles.remove(&connection_id);
        state.records.remove(&connection_id)
    }

    pub fn stats(&self) -> RegistryStats {
        let state = self.lock();
        RegistryStats {
            connections: state.handles.len(),
            authenticated: state.records.len(),
        }
    }
}
