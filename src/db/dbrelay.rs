use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Error as SqlxError, Row};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{GuestAccess, PermissionCheck, PermissionLevel, Session};
use crate::services::{PermissionOracle, SessionStore};

/// Permission and session persistence on PostgreSQL.
///
/// Expects the tables from `migrations/0001_relay.sql`.
pub struct PgRelayStore {
    pool: PgPool,
}

impl PgRelayStore {
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    pub async fn connect(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600)) // Close idle connections after 10 minutes
            .max_lifetime(Duration::from_secs(1800)) // Recycle connections after 30 minutes
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    fn log_pool_state(&self, action: &str) {
        let pool_idle = self.pool.num_idle() as u32;
        let pool_size = self.pool.size();
        debug!(
            "{}. Pool connections: {} idle, {} in use",
            action,
            pool_idle,
            pool_size.saturating_sub(pool_idle)
        );
    }
}

#[async_trait]
impl PermissionOracle for PgRelayStore {
    async fn check_document_permission(
        &self,
        document_id: &str,
        user_email: &str,
        required: PermissionLevel,
    ) -> Result<PermissionCheck, StoreError> {
        self.log_pool_state(&format!("Checking {} access for {} on {}", required, user_email, document_id));

        let query_sql = r#"
            SELECT
                d.owner_email,
                p.permission
            FROM documents d
                LEFT JOIN document_permissions p
                    ON p.document_id = d.id AND p.user_email = $2
            WHERE
                d.id = $1
                AND d.deleted = FALSE
        "#;

        let row = sqlx::query(query_sql)
            .bind(document_id)
            .bind(user_email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Permission lookup failed for document {}: {}", document_id, e);
                e
            })?;

        let Some(row) = row else {
            debug!("Document {} not found", document_id);
            return Ok(PermissionCheck::denied());
        };

        let owner_email: String = row.try_get("owner_email")?;
        let granted: Option<String> = row.try_get("permission")?;

        let level = if owner_email.eq_ignore_ascii_case(user_email) {
            Some(PermissionLevel::Owner)
        } else {
            match granted.as_deref().map(str::parse::<PermissionLevel>) {
                Some(Ok(level)) => Some(level),
                Some(Err(e)) => {
                    warn!("Ignoring permission row for {} on {}: {}", user_email, document_id, e);
                    None
                }
                None => None,
            }
        };

        Ok(PermissionCheck::evaluate(level, required))
    }

    async fn validate_user(&self, user_email: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(user_email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn validate_guest_access(
        &self,
        document_id: &str,
        share_token: &str,
    ) -> Result<GuestAccess, StoreError> {
        let query_sql = r#"
            SELECT 1
            FROM share_links s
            WHERE
                s.document_id = $1
                AND s.token = $2
                AND (s.expires_at IS NULL OR s.expires_at > NOW())
        "#;

        let row = sqlx::query(query_sql)
            .bind(document_id)
            .bind(share_token)
            .fetch_optional(&self.pool)
            .await?;

        // Whatever level the link was created with, guests stay viewers.
        Ok(match row {
            Some(_) => GuestAccess::viewer(),
            None => GuestAccess::denied(),
        })
    }
}

#[async_trait]
impl SessionStore for PgRelayStore {
    async fn create_session(
        &self,
        document_id: &str,
        user_id: &str,
        user_email: &str,
        user_name: Option<&str>,
    ) -> Result<Session, StoreError> {
        let query_sql = r#"
            INSERT INTO document_sessions
                (id, document_id, user_id, user_email, user_name, last_active_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW(), NOW())
            RETURNING id, document_id, user_id, user_email, user_name,
                      last_active_at, cursor_position, created_at, updated_at
        "#;

        let session = sqlx::query_as::<_, Session>(query_sql)
            .bind(Uuid::new_v4())
            .bind(document_id)
            .bind(user_id)
            .bind(user_email)
            .bind(user_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to create session for {} on {}: {}", user_email, document_id, e);
                e
            })?;

        info!("Session {} created for {} on {}", session.id, user_email, document_id);
        Ok(session)
    }

    async fn update_session_activity(
        &self,
        session_id: Uuid,
        cursor: Option<&Value>,
    ) -> Result<(), StoreError> {
        let query_sql = r#"
            UPDATE document_sessions
            SET
                last_active_at = NOW(),
                cursor_position = COALESCE($2, cursor_position),
                updated_at = NOW()
            WHERE id = $1
        "#;

        sqlx::query(query_sql)
            .bind(session_id)
            .bind(cursor.map(Json))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM document_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!("Session {} already removed", session_id);
        }
        Ok(())
    }
}
