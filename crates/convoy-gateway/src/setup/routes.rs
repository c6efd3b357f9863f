use crate::auth::auth_middleware;
use crate::handlers::{health, login, upload};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use convoy_core::constants::MULTIPART_OVERHEAD_BYTES;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router<()> {
    let config = &state.config;

    // Protected routes (require authentication)
    let protected_routes = protected_routes().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    let body_limit = config.max_upload_size_bytes + MULTIPART_OVERHEAD_BYTES;
    tracing::info!(
        max_upload_mb = config.max_upload_size_bytes / 1024 / 1024,
        http_concurrency_limit = config.http_concurrency_limit,
        "HTTP limits configured"
    );

    public_routes()
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(ConcurrencyLimitLayer::new(config.http_concurrency_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Public routes (no authentication required)
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(health::liveness_check))
        .route("/readyz", get(health::readiness_check))
        .route("/login", post(login::login))
}

fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/upload", post(upload::upload_video))
}
