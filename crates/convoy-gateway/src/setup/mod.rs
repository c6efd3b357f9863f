//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::auth::HttpIdentityService;
use crate::state::AppState;
use anyhow::{Context, Result};
use convoy_core::GatewayConfig;
use convoy_queue::create_queue;
use convoy_storage::{create_storage, with_timeout};
use std::sync::Arc;

/// Build backends, state and router from configuration
pub async fn initialize_app(config: GatewayConfig) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;
    tracing::info!(environment = %config.base.environment, "Configuration loaded and validated");

    let storage = create_storage(&config.base.storage)
        .await
        .context("Failed to initialize storage")?;
    let queue = create_queue(&config.base.queue)
        .await
        .context("Failed to initialize task queue")?;
    let identity = HttpIdentityService::new(config.auth_svc_url.clone(), config.verifier_timeout)
        .context("Failed to build identity service client")?;

    // Not fatal: /readyz keeps reporting until storage comes up
    if let Err(e) = with_timeout(
        config.base.storage.timeout,
        "health_check",
        storage.health_check(),
    )
    .await
    {
        tracing::warn!(error = %e, "Storage is not reachable at startup");
    }

    let state = Arc::new(AppState::new(
        config,
        storage,
        queue,
        Arc::new(identity),
    ));
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
