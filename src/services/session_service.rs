use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::Session;

/// Durable record of who is actively viewing which document.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        document_id: &str,
        user_id: &str,
        user_email: &str,
        user_name: Option<&str>,
    ) -> Result<Session, StoreError>;

    /// Touch `last_active_at`, storing the cursor payload when given.
    async fn update_session_activity(
        &self,
        session_id: Uuid,
        cursor: Option<&Value>,
    ) -> Result<(), StoreError>;

    /// Removing an unknown session is not an error.
    async fn remove_session(&self, session_id: Uuid) -> Result<(), StoreError>;
}
