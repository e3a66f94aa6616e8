//! Application entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use x402_solana_toolkit::api::{RateLimitConfig, create_router_with_rate_limit};
use x402_solana_toolkit::app::AppState;
use x402_solana_toolkit::chain::HttpRpcClient;
use x402_solana_toolkit::config::Config;
use x402_solana_toolkit::domain::traits::{DefaultRetryClassifier, ReplayCacheBacking, WebhookQueueBacking};
use x402_solana_toolkit::replay::{InMemoryReplayCache, RedisReplayCache};
use x402_solana_toolkit::requirements::RequirementsGenerator;
use x402_solana_toolkit::verify::Orchestrator;
use x402_solana_toolkit::webhook::{DeliveryLogger, InMemoryWebhookQueue, RedisWebhookQueue, WebhookManager};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,x402_solana_toolkit=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl+c"),
        _ = terminate => info!("received sigterm"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("x402 Solana toolkit v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("failed to load configuration")?;

    info!(rpc_url = %config.rpc_url, network = ?config.network, "initializing rpc client");
    let rpc: Arc<dyn x402_solana_toolkit::domain::traits::RpcClient> =
        Arc::new(HttpRpcClient::new(config.rpc_url.clone()));

    let replay_cache: Arc<dyn ReplayCacheBacking> = match &config.shared_store_url {
        Some(url) => {
            info!("using shared replay cache backing");
            Arc::new(
                RedisReplayCache::new(url, config.replay_ttl_seconds)
                    .context("failed to connect replay cache to shared store")?,
            )
        }
        None => {
            info!("using in-process replay cache backing");
            Arc::new(InMemoryReplayCache::new(config.replay_ttl_seconds as i64 * 1_000))
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&rpc),
        Arc::clone(&replay_cache),
        Arc::new(DefaultRetryClassifier),
    ));

    let requirements = Arc::new(RequirementsGenerator::new(
        config.network,
        config.usdc_mint.clone(),
        config.resource_timeout_seconds,
    ));

    let webhook_backing: Arc<dyn WebhookQueueBacking> = match &config.shared_store_url {
        Some(url) => {
            info!("using shared webhook queue backing");
            Arc::new(RedisWebhookQueue::new(url).context("failed to connect webhook queue to shared store")?)
        }
        None => {
            info!("using in-process webhook queue backing");
            Arc::new(InMemoryWebhookQueue::new())
        }
    };

    let logger = Arc::new(DeliveryLogger::new(config.webhook_log_capacity));
    let webhook_manager = WebhookManager::new(webhook_backing, logger);
    info!("webhook delivery manager started");

    let app_state = Arc::new(AppState::new(
        orchestrator,
        requirements,
        Arc::clone(&webhook_manager),
        rpc,
        replay_cache,
        config.resource_price_usd,
        config.recipient_wallet.clone(),
    ));

    let router = create_router_with_rate_limit(app_state, RateLimitConfig::from_env());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("server listening on http://{}", addr);
    info!("swagger ui at http://{}/swagger-ui", addr);

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    if let Err(error) = webhook_manager.close().await {
        tracing::warn!(%error, "error closing webhook manager");
    }
    info!("server shutdown complete");
    Ok(())
}
