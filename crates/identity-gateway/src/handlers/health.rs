//! Liveness handler.

use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub migration_enabled: bool,
}

/// Handler for GET /health
///
/// Checks no dependencies; a failure means the process is hung.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        migration_enabled: state.migration.is_some(),
    })
}
