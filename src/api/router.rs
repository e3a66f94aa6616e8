//! Axum router wiring for the demo HTTP surface (§4.O).

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{delete, get, post};
use governor::{Quota, RateLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::admin::{add_webhook_handler, list_webhooks_handler, remove_webhook_handler};
use crate::api::handlers::{health_check_handler, protected_resource_handler, ApiDoc};
use crate::app::AppState;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_second: 10, burst_size: 20 }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let requests_per_second = std::env::var("RATE_LIMIT_RPS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);
        let burst_size = std::env::var("RATE_LIMIT_BURST").ok().and_then(|v| v.parse().ok()).unwrap_or(20);
        Self { requests_per_second, burst_size }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    base_router(state)
}

pub fn create_router_with_rate_limit(state: Arc<AppState>, config: RateLimitConfig) -> Router {
    let quota = Quota::per_second(std::num::NonZeroU32::new(config.requests_per_second).unwrap_or(
        std::num::NonZeroU32::new(10).expect("10 is nonzero"),
    ))
    .allow_burst(std::num::NonZeroU32::new(config.burst_size).unwrap_or(std::num::NonZeroU32::new(20).expect("20 is nonzero")));
    let limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>> = Arc::new(RateLimiter::direct(quota));

    base_router(state).layer(axum::middleware::from_fn(move |req: axum::extract::Request, next: axum::middleware::Next| {
        let limiter = limiter.clone();
        async move {
            if limiter.check().is_err() {
                return axum::response::IntoResponse::into_response((
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    axum::Json(crate::domain::types::RateLimitResponse {
                        error: crate::domain::types::ErrorDetail {
                            r#type: "rate_limited".to_string(),
                            message: "too many requests".to_string(),
                        },
                        retry_after: 1,
                    }),
                ));
            }
            next.run(req).await
        }
    }))
}

fn base_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/protected", get(protected_resource_handler))
        .route("/admin/webhooks", post(add_webhook_handler).get(list_webhooks_handler))
        .route("/admin/webhooks/{id}", delete(remove_webhook_handler))
        .route("/healthz", get(health_check_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(30)))
}
