use thiserror::Error;

use crate::models::PermissionLevel;

/// Failures surfaced to a client as an `error` message.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing required authentication fields: userId and userEmail")]
    MissingCredentials,

    #[error("Invalid user")]
    InvalidUser,

    #[error("Guest access denied: invalid or expired share token")]
    GuestAccessDenied,

    #[error("Access denied: {required} permission required")]
    PermissionDenied { required: PermissionLevel },

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Not a member of document {document_id}")]
    NotInDocument { document_id: String },

    #[error("Invalid message format: {0}")]
    MalformedMessage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        RelayError::MalformedMessage(reason.into())
    }
}

/// Failures of the permission oracle or session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for RelayError {
    fn from(e: StoreError) -> Self {
        RelayError::Internal(e.to_string())
    }
}
