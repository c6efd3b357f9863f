//! Liveness and readiness probes.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use convoy_storage::with_timeout;
use std::sync::Arc;

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json("OK"))
}

/// Readiness probe - the object store answers within its timeout.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timeout = state.config.base.storage.timeout;
    let backend = state.storage.backend_type().to_string();

    match with_timeout(timeout, "health_check", state.storage.health_check()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ready", "storage": backend })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Storage readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "not_ready", "storage": backend })),
            )
        }
    }
}
