use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One connection's active participation in one document.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub document_id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: Option<String>,
    pub last_active_at: DateTime<Utc>,
    pub cursor_position: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(document_id: &str, user_id: &str, user_email: &str, user_name: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            user_email: user_email.to_string(),
            user_name: user_name.map(str::to_string),
            last_active_at: now,
            cursor_position: None,
            created_at: now,
            updated_at: now,
        }
    }
}
