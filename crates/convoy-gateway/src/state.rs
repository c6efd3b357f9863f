//! Application state shared by every request handler.

use crate::auth::IdentityService;
use convoy_core::GatewayConfig;
use convoy_queue::TaskQueue;
use convoy_storage::Storage;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub storage: Arc<dyn Storage>,
    pub queue: Arc<dyn TaskQueue>,
    pub identity: Arc<dyn IdentityService>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        storage: Arc<dyn Storage>,
        queue: Arc<dyn TaskQueue>,
        identity: Arc<dyn IdentityService>,
    ) -> Self {
        Self {
            config,
            storage,
            queue,
            identity,
        }
    }
}
