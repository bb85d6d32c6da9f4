use crate::{handlers::{diagnostics, health_check}, state::AppState};
use axum::{routing::get, Router};

/// Create API routes
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/diagnostics", get(diagnostics))
}
