use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RelayError;

/// Raw inbound envelope. Every field except `type` is optional on the wire;
/// which ones are required depends on the message type.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub document_id: Option<String>,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub user_image: Option<String>,
    pub share_token: Option<String>,
    pub data: Option<Value>,
}

impl InboundEnvelope {
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text).map_err(|e| RelayError::malformed(e.to_string()))
    }
}

/// Identity claimed by an `authenticate` message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthClaim {
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub user_image: Option<String>,
    pub share_token: Option<String>,
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinMessage {
    pub document_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeMessage {
    pub document_id: String,
    pub data: Value,
}

/// Cursor and presence payloads. `document_id` falls back to the
/// connection's current document when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayMessage {
    pub document_id: Option<String>,
    pub data: Value,
}

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Authenticate(AuthClaim),
    JoinDocument(JoinMessage),
    LeaveDocument,
    DocumentChange(ChangeMessage),
    CursorUpdate(RelayMessage),
    UserPresence(RelayMessage),
    Ping,
}

impl ClientMessage {
    pub fn is_authenticate(&self) -> bool {
        matches!(self, ClientMessage::Authenticate(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Authenticate(_) => "authenticate",
            ClientMessage::JoinDocument(_) => "join-document",
            ClientMessage::LeaveDocument => "leave-document",
            ClientMessage::DocumentChange(_) => "document-change",
            ClientMessage::CursorUpdate(_) => "cursor-update",
            ClientMessage::UserPresence(_) => "user-presence",
            ClientMessage::Ping => "ping",
        }
    }

    pub fn from_envelope(envelope: InboundEnvelope) -> Result<Self, RelayError> {
        let InboundEnvelope {
            msg_type,
            document_id,
            user_id,
            user_email,
            user_name,
            user_image,
            share_token,
            data,
        } = envelope;
        let document_id = document_id.filter(|d| !d.trim().is_empty());

        match msg_type.as_str() {
            "authenticate" => Ok(ClientMessage::Authenticate(AuthClaim {
                user_id,
                user_email,
                user_name,
                user_image,
                share_token,
                document_id,
            })),
            "join-document" => {
                let document_id = document_id.ok_or_else(|| RelayError::malformed("documentId is required"))?;
                Ok(ClientMessage::JoinDocument(JoinMessage { document_id }))
            }
            "leave-document" => Ok(ClientMessage::LeaveDocument),
            "document-change" => {
                let document_id = document_id.ok_or_else(|| RelayError::malformed("documentId is required"))?;
                let data = data.ok_or_else(|| RelayError::malformed("data is required"))?;
                Ok(ClientMessage::DocumentChange(ChangeMessage { document_id, data }))
            }
            "cursor-update" => Ok(ClientMessage::CursorUpdate(RelayMessage {
                document_id,
                data: data.unwrap_or(Value::Null),
            })),
            "user-presence" => Ok(ClientMessage::UserPresence(RelayMessage {
                document_id,
                data: data.unwrap_or(Value::Null),
            })),
            "ping" => Ok(ClientMessage::Ping),
            other => Err(RelayError::malformed(format!("unknown message type '{}'", other))),
        }
    }
}

/// Identity fields echoed in presence-style messages.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserFields {
    pub user_id: String,
    pub user_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_image: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreatedData {
    pub session_id: Uuid,
}

/// Outbound message. Serialized as `{"type": "...", ...}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Connected {
        message: String,
        connection_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Authenticated {
        #[serde(flatten)]
        user: UserFields,
        #[serde(skip_serializing_if = "Option::is_none")]
        share_token: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    UserJoined {
        #[serde(flatten)]
        user: UserFields,
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    SessionCreated {
        data: SessionCreatedData,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    UserLeft {
        #[serde(flatten)]
        user: UserFields,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    DocumentChange {
        user_id: String,
        user_email: String,
        data: Value,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_ack: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    CursorUpdate {
        #[serde(flatten)]
        user: UserFields,
        data: Value,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    UserPresence {
        #[serde(flatten)]
        user: UserFields,
        data: Value,
        timestamp: DateTime<Utc>,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    Error {
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn error(error: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connected { .. } => "connected",
            ServerMessage::Authenticated { .. } => "authenticated",
            ServerMessage::UserJoined { .. } => "user-joined",
            ServerMessage::SessionCreated { .. } => "session-created",
            ServerMessage::UserLeft { .. } => "user-left",
            ServerMessage::DocumentChange { .. } => "document-change",
            ServerMessage::CursorUpdate { .. } => "cursor-update",
            ServerMessage::UserPresence { .. } => "user-presence",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::Error { .. } => "error",
        }
    }
}
