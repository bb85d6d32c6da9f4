use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{GuestAccess, PermissionCheck, PermissionLevel};

/// Answers access questions about users and documents.
///
/// Implementations never mutate relay state; they are pure queries against
/// whatever backs the permission model (Postgres in production, an in-memory
/// table in tests and local development).
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    /// Does `user_email` hold at least `required` on `document_id`?
    async fn check_document_permission(
        &self,
        document_id: &str,
        user_email: &str,
        required: PermissionLevel,
    ) -> Result<PermissionCheck, StoreError>;

    /// Is `user_email` a known registered user?
    async fn validate_user(&self, user_email: &str) -> Result<bool, StoreError>;

    /// Is `share_token` a valid guest link for `document_id`?
    async fn validate_guest_access(
        &self,
        document_id: &str,
        share_token: &str,
    ) -> Result<GuestAccess, StoreError>;
}
