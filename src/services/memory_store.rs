use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{GuestAccess, PermissionCheck, PermissionLevel, Session};
use crate::services::permission_service::PermissionOracle;
use crate::services::session_service::SessionStore;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct PermissionTable {
    users: HashSet<String>,
    // (document_id, user_email) -> level
    grants: HashMap<(String, String), PermissionLevel>,
    // (document_id, token)
    share_tokens: HashSet<(String, String)>,
}

/// Permission oracle backed by in-process tables.
///
/// In permissive mode every non-empty email is a valid user with editor
/// access to every document; this is what a development server without a
/// database runs on.
#[derive(Default)]
pub struct InMemoryPermissions {
    table: Mutex<PermissionTable>,
    permissive: bool,
}

impl InMemoryPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissive() -> Self {
        Self {
            table: Mutex::default(),
            permissive: true,
        }
    }

    pub fn add_user(&self, user_email: &str) {
        lock(&self.table).users.insert(user_email.to_string());
    }

    /// Registers the user too.
    pub fn grant(&self, document_id: &str, user_email: &str, level: PermissionLevel) {
        let mut table = lock(&self.table);
        table.users.insert(user_email.to_string());
        table
            .grants
            .insert((document_id.to_string(), user_email.to_string()), level);
    }

    pub fn add_share_token(&self, document_id: &str, token: &str) {
        lock(&self.table)
            .share_tokens
            .insert((document_id.to_string(), token.to_string()));
    }

    pub fn with_user(self, user_email: &str) -> Self {
        self.add_user(user_email);
        self
    }

    pub fn with_grant(self, document_id: &str, user_email: &str, level: PermissionLevel) -> Self {
        self.grant(document_id, user_email, level);
        self
    }

    pub fn with_share_token(self, document_id: &str, token: &str) -> Self {
        self.add_share_token(document_id, token);
        self
    }
}

#[async_trait]
impl PermissionOracle for InMemoryPermissions {
    async fn check_document_permission(
        &self,
        document_id: &str,
        user_email: &str,
        required: PermissionLevel,
    ) -> Result<PermissionCheck, StoreError> {
        let table = lock(&self.table);
        let level = table
            .grants
            .get(&(document_id.to_string(), user_email.to_string()))
            .copied()
            .or_else(|| (self.permissive && !user_email.is_empty()).then_some(PermissionLevel::Editor));
        Ok(PermissionCheck::evaluate(level, required))
    }

    async fn validate_user(&self, user_email: &str) -> Result<bool, StoreError> {
        if self.permissive {
            return Ok(!user_email.is_empty());
        }
        Ok(lock(&self.table).users.contains(user_email))
    }

    async fn validate_guest_access(
        &self,
        document_id: &str,
        share_token: &str,
    ) -> Result<GuestAccess, StoreError> {
        let table = lock(&self.table);
        if table
            .share_tokens
            .contains(&(document_id.to_string(), share_token.to_string()))
        {
            Ok(GuestAccess::viewer())
        } else {
            Ok(GuestAccess::denied())
        }
    }
}

/// Session store kept in a process-local map.
#[derive(Default)]
pub struct InMemorySessions {
    sessions: Mutex<HashMap<Uuid, Session>>,
    failing: AtomicBool,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails, for exercising best-effort paths.
    pub fn failing() -> Self {
        Self {
            sessions: Mutex::default(),
            failing: AtomicBool::new(true),
        }
    }

    /// Switch failure on or off for all subsequent calls.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get(&self, session_id: Uuid) -> Option<Session> {
        lock(&self.sessions).get(&session_id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("session store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn create_session(
        &self,
        document_id: &str,
        user_id: &str,
        user_email: &str,
        user_name: Option<&str>,
    ) -> Result<Session, StoreError> {
        self.check_available()?;
        let session = Session::new(document_id, user_id, user_email, user_name);
        lock(&self.sessions).insert(session.id, session.clone());
        Ok(session)
    }

    async fn update_session_activity(
        &self,
        session_id: Uuid,
        cursor: Option<&Value>,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut sessions = lock(&self.sessions);
        if let Some(session) = sessions.get_mut(&session_id) {
            let now = Utc::now();
            session.last_active_at = now;
            session.updated_at = now;
            if let Some(cursor) = cursor {
                session.cursor_position = Some(cursor.clone());
            }
        }
        Ok(())
    }

    async fn remove_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        self.check_available()?;
        lock(&self.sessions).remove(&session_id);
        Ok(())
    }
}
