//! Shared application state for the demo HTTP surface (§4.O).

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::traits::{ReplayCacheBacking, RpcClient};
use crate::domain::types::{HealthResponse, HealthStatus, WebhookSubscription};
use crate::requirements::RequirementsGenerator;
use crate::verify::Orchestrator;
use crate::webhook::WebhookManager;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub requirements: Arc<RequirementsGenerator>,
    pub webhook_manager: Arc<WebhookManager>,
    pub rpc: Arc<dyn RpcClient>,
    pub replay_cache: Arc<dyn ReplayCacheBacking>,
    /// Demo resource configuration: what `/protected` charges and who it pays.
    pub resource_price_usd: f64,
    pub recipient_wallet: String,
    /// Subscriptions registered via `/admin/webhooks`.
    pub subscriptions: Arc<DashMap<Uuid, WebhookSubscription>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        requirements: Arc<RequirementsGenerator>,
        webhook_manager: Arc<WebhookManager>,
        rpc: Arc<dyn RpcClient>,
        replay_cache: Arc<dyn ReplayCacheBacking>,
        resource_price_usd: f64,
        recipient_wallet: String,
    ) -> Self {
        Self {
            orchestrator,
            requirements,
            webhook_manager,
            rpc,
            replay_cache,
            resource_price_usd,
            recipient_wallet,
            subscriptions: Arc::new(DashMap::new()),
        }
    }

    pub async fn health_check(&self) -> HealthResponse {
        let rpc_status = match self.rpc.get_token_account_balance("11111111111111111111111111111111").await {
            Ok(_) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Degraded,
        };
        let cache_status = match self.replay_cache.is_used("healthcheck").await {
            Ok(_) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Degraded,
        };
        let queue_status = match self.webhook_manager.queue_size().await {
            Ok(_) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Degraded,
        };
        HealthResponse::overall(rpc_status, cache_status, queue_status)
    }
}
