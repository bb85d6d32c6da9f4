use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::PgRelayStore;
use crate::services::{CachedPermissionOracle, InMemoryPermissions, InMemorySessions, PermissionOracle, SessionStore};
use crate::websocket::{MessageRouter, RouterConfig};
use crate::ws::{ConnectionRegistry, RoomDirectory};

/// Shared state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<MessageRouter>,
}

impl AppState {
    /// Wire a fresh registry and room directory to the given collaborators.
    pub fn new(
        permissions: Arc<dyn PermissionOracle>,
        sessions: Arc<dyn SessionStore>,
        router_config: RouterConfig,
    ) -> Self {
        let router = MessageRouter::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(RoomDirectory::new()),
            permissions,
            sessions,
            router_config,
        );
        Self { router: Arc::new(router) }
    }

    /// Build the state from configuration, connecting to the database when
    /// one is configured.
    pub async fn from_config(config: &Config) -> Self {
        if let Some(db_url) = &config.db_url {
            match PgRelayStore::connect(db_url).await {
                Ok(store) => {
                    info!("Database initialized successfully");
                    let store = Arc::new(store);
                    let permissions = CachedPermissionOracle::new(store.clone(), config.user_cache_ttl());
                    return Self::new(Arc::new(permissions), store, config.router_config());
                }
                Err(e) => error!("Failed to initialize database: {}", e),
            }
        } else {
            warn!("No database URL configured");
        }

        let permissions = if config.is_development() {
            warn!("Development mode: every user is accepted with editor access");
            InMemoryPermissions::permissive()
        } else {
            error!("No permission store available - all authentication attempts will be rejected");
            InMemoryPermissions::new()
        };
        Self::new(
            Arc::new(permissions),
            Arc::new(InMemorySessions::new()),
            config.router_config(),
        )
    }
}
