//! Admin API handlers for webhook subscription management.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::domain::error::{AppError, ValidationError};
use crate::domain::types::{RetryPolicy, WebhookEvent, WebhookSubscription};

/// Request body for registering a webhook subscription.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AddWebhookRequest {
    pub url: String,
    pub secret: String,
    #[serde(default)]
    pub subscribed_events: Option<Vec<WebhookEvent>>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookRegisteredResponse {
    pub id: Uuid,
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookRemovedResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookEntryResponse {
    pub id: Uuid,
    pub url: String,
    pub subscribed_events: Option<Vec<WebhookEvent>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListWebhooksResponse {
    pub count: usize,
    pub entries: Vec<WebhookEntryResponse>,
}

/// Register a webhook subscription.
///
/// POST /admin/webhooks
#[utoipa::path(
    post,
    path = "/admin/webhooks",
    tag = "admin",
    request_body = AddWebhookRequest,
    responses(
        (status = 200, description = "Webhook registered", body = WebhookRegisteredResponse),
        (status = 400, description = "Invalid request", body = crate::domain::types::ErrorResponse),
    )
)]
pub async fn add_webhook_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddWebhookRequest>,
) -> Result<Json<WebhookRegisteredResponse>, AppError> {
    if payload.url.trim().is_empty() {
        return Err(AppError::Validation(ValidationError::Malformed("url must not be empty".to_string())));
    }
    if payload.secret.trim().is_empty() {
        return Err(AppError::Validation(ValidationError::Malformed("secret must not be empty".to_string())));
    }

    let id = Uuid::new_v4();
    let subscription = WebhookSubscription {
        id,
        url: payload.url.clone(),
        secret: payload.secret,
        subscribed_events: payload.subscribed_events,
        retry_policy: payload.retry_policy,
        per_delivery_timeout_ms: 5_000,
        extra_headers: payload.extra_headers,
    };

    state.subscriptions.insert(id, subscription);
    warn!(%id, url = %payload.url, "admin registered a webhook subscription");

    Ok(Json(WebhookRegisteredResponse { id, url: payload.url }))
}

/// Remove a webhook subscription.
///
/// DELETE /admin/webhooks/{id}
#[utoipa::path(
    delete,
    path = "/admin/webhooks/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Webhook removed", body = WebhookRemovedResponse),
        (status = 404, description = "Subscription not found", body = crate::domain::types::ErrorResponse),
    )
)]
pub async fn remove_webhook_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WebhookRemovedResponse>, AppError> {
    if state.subscriptions.remove(&id).is_some() {
        Ok(Json(WebhookRemovedResponse { success: true, message: format!("subscription {id} removed") }))
    } else {
        Err(AppError::Validation(ValidationError::Malformed(format!("subscription {id} not found"))))
    }
}

/// List registered webhook subscriptions.
///
/// GET /admin/webhooks
#[utoipa::path(
    get,
    path = "/admin/webhooks",
    tag = "admin",
    responses((status = 200, description = "List of webhook subscriptions", body = ListWebhooksResponse))
)]
pub async fn list_webhooks_handler(State(state): State<Arc<AppState>>) -> Json<ListWebhooksResponse> {
    let entries: Vec<WebhookEntryResponse> = state
        .subscriptions
        .iter()
        .map(|kv| WebhookEntryResponse {
            id: kv.id,
            url: kv.url.clone(),
            subscribed_events: kv.subscribed_events.clone(),
        })
        .collect();

    Json(ListWebhooksResponse { count: entries.len(), entries })
}
