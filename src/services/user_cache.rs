use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{GuestAccess, PermissionCheck, PermissionLevel};
use crate::services::permission_service::PermissionOracle;

/// Caches positive `validate_user` answers in front of another oracle.
///
/// Only confirmed users are cached so that a newly registered account is
/// picked up on its next authenticate attempt. Document permissions and
/// share tokens are always asked fresh.
pub struct CachedPermissionOracle {
    inner: Arc<dyn PermissionOracle>,
    valid_users: Cache<String, ()>,
}

impl CachedPermissionOracle {
    pub fn new(inner: Arc<dyn PermissionOracle>, ttl: Duration) -> Self {
        let valid_users = Cache::builder()
            .max_capacity(100_000)
            .time_to_idle(ttl)
            .build();
        info!("User validation cache initialized (ttl {:?})", ttl);
        Self { inner, valid_users }
    }

    pub fn cached_users(&self) -> u64 {
        self.valid_users.entry_count()
    }
}

#[async_trait]
impl PermissionOracle for CachedPermissionOracle {
    async fn check_document_permission(
        &self,
        document_id: &str,
        user_email: &str,
        required: PermissionLevel,
    ) -> Result<PermissionCheck, StoreError> {
        self.inner
            .check_document_permission(document_id, user_email, required)
            .await
    }

    async fn validate_user(&self, user_email: &str) -> Result<bool, StoreError> {
        if self.valid_users.get(user_email).await.is_some() {
            return Ok(true);
        }

        debug!("User cache miss for {}", user_email);
        let valid = self.inner.validate_user(user_email).await?;
        if valid {
            self.valid_users.insert(user_email.to_string(), ()).await;
        }
        Ok(valid)
    }

    async fn validate_guest_access(
        &self,
        document_id: &str,
        share_token: &str,
    ) -> Result<GuestAccess, StoreError> {
        self.inner.validate_guest_access(document_id, share_token).await
    }
}
