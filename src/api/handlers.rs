//! HTTP request handlers with OpenAPI documentation (§4.O demo surface).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use tracing::error;
use utoipa::OpenApi;

use crate::app::AppState;
use crate::domain::error::{AppError, CacheError, ExternalServiceError, QueueError, RpcError};
use crate::domain::types::{
    ErrorDetail, ErrorResponse, HealthResponse, HealthStatus, PaymentNotification,
    RateLimitResponse, VerificationVerdict, WebhookEvent, WebhookPayload,
};
use crate::header;
use crate::matcher::MatchOptions;
use crate::verify::VerifyOptions;

const X_PAYMENT_HEADER: &str = "X-PAYMENT";
const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "x402 Solana Toolkit — demo API",
        version = "0.1.0",
        description = "Reference HTTP surface over the x402-over-Solana verification and webhook toolkit",
        license(name = "MIT")
    ),
    paths(protected_resource_handler, health_check_handler),
    components(schemas(
        HealthResponse,
        HealthStatus,
        ErrorResponse,
        ErrorDetail,
        RateLimitResponse,
        VerificationVerdict,
        crate::api::admin::AddWebhookRequest,
        crate::api::admin::WebhookRegisteredResponse,
        crate::api::admin::WebhookRemovedResponse,
        crate::api::admin::ListWebhooksResponse,
        crate::api::admin::WebhookEntryResponse,
    )),
    tags(
        (name = "payments", description = "x402-protected demo resource"),
        (name = "admin", description = "Webhook subscription management"),
        (name = "health", description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;

/// A demo resource gated behind an x402 payment.
///
/// Absent an `X-PAYMENT` header, responds 402 with the price. Given one,
/// verifies it on-chain and either serves the resource or rejects the proof.
#[utoipa::path(
    get,
    path = "/protected",
    tag = "payments",
    responses(
        (status = 200, description = "Resource served; payment verified"),
        (status = 402, description = "Payment required or the supplied proof was rejected", body = VerificationVerdict),
    )
)]
pub async fn protected_resource_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(header_value) = headers.get(X_PAYMENT_HEADER).and_then(|v| v.to_str().ok()) else {
        let requirements = match state.requirements.generate(&crate::requirements::PriceRequest {
            recipient_wallet: state.recipient_wallet.clone(),
            price_usd: state.resource_price_usd,
            resource: Some("/protected".to_string()),
            description: "Access to the protected demo resource".to_string(),
        }) {
            Ok(requirements) => requirements,
            Err(error) => {
                error!(%error, "failed to build payment requirements");
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"error": error})))
                    .into_response();
            }
        };
        return (StatusCode::PAYMENT_REQUIRED, Json(requirements)).into_response();
    };

    let options = VerifyOptions {
        expected_recipient: state.recipient_wallet.clone(),
        expected_mint: state.requirements.mint.clone(),
        required_smallest_unit: match crate::currency::usd_to_smallest_unit(state.resource_price_usd) {
            Ok(amount) => amount,
            Err(error) => {
                error!(%error, "invalid configured resource price");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
        commitment: crate::domain::types::Commitment::Confirmed,
        match_options: MatchOptions::default(),
        retry_policy: crate::retry::RetryPolicy::default(),
        max_age_seconds: Some(300),
    };

    let verdict = state.orchestrator.verify_header(header_value, &options).await;

    match &verdict {
        VerificationVerdict::Valid { signature, transfer, block_time, slot } => {
            let notification = PaymentNotification {
                signature: signature.clone(),
                amount_smallest: transfer.amount,
                amount_usd: state.resource_price_usd,
                payer: transfer.authority.clone(),
                recipient: transfer.destination.clone(),
                resource: Some("/protected".to_string()),
                block_time: *block_time,
                slot: *slot,
            };
            dispatch_payment_confirmed(&state, notification);

            let receipt = crate::domain::types::PaymentReceipt {
                signature: signature.clone(),
                network: crate::currency::network_to_wire(crate::domain::types::Network::Devnet),
                amount: transfer.amount,
                timestamp: chrono::Utc::now().timestamp(),
                status: crate::domain::types::ReceiptStatus::Verified,
                block_time: *block_time,
                slot: *slot,
            };
            let mut response = Json(serde_json::json!({ "resource": "this content was paid for" }))
                .into_response();
            if let Ok(encoded) = header::encode_receipt(&receipt) {
                if let Ok(value) = encoded.parse() {
                    response.headers_mut().insert(X_PAYMENT_RESPONSE_HEADER, value);
                }
            }
            response
        }
        VerificationVerdict::Invalid { .. } => (StatusCode::PAYMENT_REQUIRED, Json(&verdict)).into_response(),
    }
}

fn dispatch_payment_confirmed(state: &Arc<AppState>, notification: PaymentNotification) {
    let payload = WebhookPayload {
        event: WebhookEvent::PaymentConfirmed,
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
        payment: notification,
        metadata: None,
    };
    for entry in state.subscriptions.iter() {
        state.webhook_manager.send_async(entry.value().clone(), payload.clone());
    }
}

/// Detailed health check across the RPC client, replay cache, and webhook queue.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses((status = 200, description = "Health status", body = HealthResponse))
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.health_check().await)
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type, message) = match &self {
            AppError::Verification(code) => (StatusCode::PAYMENT_REQUIRED, "verification_error", code.to_string()),
            AppError::Cache(cache_err) => match cache_err {
                CacheError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "cache_error", self.to_string()),
                CacheError::Corrupt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cache_error", self.to_string()),
            },
            AppError::Queue(queue_err) => match queue_err {
                QueueError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "queue_error", self.to_string()),
                QueueError::NotFound(_) => (StatusCode::NOT_FOUND, "queue_error", self.to_string()),
            },
            AppError::Rpc(rpc_err) => match rpc_err {
                RpcError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "rpc_error", self.to_string()),
                _ => (StatusCode::BAD_GATEWAY, "rpc_error", self.to_string()),
            },
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", self.to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error", self.to_string()),
            AppError::ExternalService(ext_err) => match ext_err {
                ExternalServiceError::Unavailable(_) => {
                    (StatusCode::BAD_GATEWAY, "external_service_error", self.to_string())
                }
                ExternalServiceError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string()),
                ExternalServiceError::RateLimited(_) => {
                    (StatusCode::TOO_MANY_REQUESTS, "rate_limited", self.to_string())
                }
                ExternalServiceError::Other(_) => {
                    (StatusCode::BAD_GATEWAY, "external_service_error", self.to_string())
                }
            },
            AppError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error", self.to_string())
            }
            AppError::Deserialization(_) => (StatusCode::BAD_REQUEST, "deserialization_error", self.to_string()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", self.to_string()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", "Rate limit exceeded".to_string()),
        };

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "server error");
        }

        let body = Json(ErrorResponse { error: ErrorDetail { r#type: error_type.to_string(), message } });
        (status, body).into_response()
    }
}
