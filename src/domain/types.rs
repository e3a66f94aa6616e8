//! Wire and domain types shared across the verification and webhook subsystems.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::error::VerificationErrorCode;

/// The canonical network identifiers this toolkit recognizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Devnet,
    Testnet,
    Localnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
            Self::Localnet => "localnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The consistency level at which the RPC observes chain state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

/// The payment scheme named in a proof or descriptor.
///
/// `Channel` exists only so callers can match exhaustively; the orchestrator
/// never attempts to verify it (see DESIGN.md open-question resolution).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Exact,
    Channel,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Channel => "channel",
        }
    }
}

// ============================================================================
// Payment requirements (server -> client, 402 body)
// ============================================================================

/// The recipient's on-chain destination for a single accepted payment method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PayTo {
    /// The recipient's token sub-account for `asset` — never the wallet itself.
    pub address: String,
    pub asset: String,
}

/// One element of the `accepts` list in a 402 response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentDescriptor {
    pub scheme: String,
    /// Wire form, e.g. `solana-devnet`.
    pub network: String,
    /// Decimal integer string in the asset's smallest unit.
    #[serde(rename = "maxAmountRequired")]
    pub max_amount_required: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub description: String,
    #[serde(rename = "payTo")]
    pub pay_to: PayTo,
    /// Seconds.
    pub timeout: u32,
}

/// The full 402 response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequirements {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub accepts: Vec<PaymentDescriptor>,
    pub error: String,
}

// ============================================================================
// Payment proof (client -> server, X-PAYMENT header)
// ============================================================================

/// The scheme-specific payload of an on-chain payment proof.
///
/// Exactly one field is ever populated; `#[serde(untagged)]` lets either
/// shape decode without a discriminant, matching the wire format in §3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(untagged)]
pub enum ProofPayload {
    Signature { signature: String },
    SerializedTransaction { serialized_transaction: String },
}

/// A decoded `X-PAYMENT` header value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PaymentProof {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    pub payload: ProofPayload,
}

/// A decoded `X-PAYMENT-RESPONSE` header value.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentReceipt {
    pub signature: String,
    pub network: String,
    pub amount: u64,
    pub timestamp: i64,
    pub status: ReceiptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Verified,
    Pending,
    Failed,
}

// ============================================================================
// Parsed transfer (component B/C output)
// ============================================================================

/// The sentinel mint value used when a `Transfer` instruction's mint cannot
/// be recovered from balance metadata.
pub const UNKNOWN_MINT: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ParsedTransfer {
    pub source: String,
    pub destination: String,
    pub authority: String,
    pub amount: u64,
    /// May be [`UNKNOWN_MINT`].
    pub mint: String,
}

// ============================================================================
// Verification verdict
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationVerdict {
    Valid {
        signature: String,
        transfer: ParsedTransfer,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block_time: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slot: Option<u64>,
    },
    Invalid {
        code: VerificationErrorCode,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        debug: Option<serde_json::Value>,
    },
}

impl VerificationVerdict {
    pub fn invalid(code: VerificationErrorCode, message: impl Into<String>) -> Self {
        Self::Invalid {
            code,
            message: message.into(),
            debug: None,
        }
    }

    pub fn invalid_with_debug(
        code: VerificationErrorCode,
        message: impl Into<String>,
        debug: serde_json::Value,
    ) -> Self {
        Self::Invalid {
            code,
            message: message.into(),
            debug: Some(debug),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn code(&self) -> Option<VerificationErrorCode> {
        match self {
            Self::Invalid { code, .. } => Some(*code),
            Self::Valid { .. } => None,
        }
    }
}

// ============================================================================
// Replay cache entry
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayCacheEntry {
    pub recipient: String,
    pub amount: u64,
    pub consumed_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

// ============================================================================
// Webhooks
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    #[serde(rename = "payment.confirmed")]
    PaymentConfirmed,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentConfirmed => "payment.confirmed",
            Self::PaymentFailed => "payment.failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Exponential,
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: BackoffKind,
}

impl RetryPolicy {
    /// `min(maxDelay, initialDelay * 2^attempts)` or `* (attempts+1)` for linear.
    pub fn next_delay_ms(&self, attempts_made: u32) -> u64 {
        let computed = match self.backoff {
            BackoffKind::Exponential => {
                self.initial_delay_ms.saturating_mul(1u64 << attempts_made.min(32))
            }
            BackoffKind::Linear => {
                self.initial_delay_ms.saturating_mul(u64::from(attempts_made) + 1)
            }
        };
        computed.min(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub url: String,
    #[serde(skip_serializing)]
    pub secret: String,
    #[serde(default)]
    pub subscribed_events: Option<Vec<WebhookEvent>>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default = "default_delivery_timeout_ms")]
    pub per_delivery_timeout_ms: u64,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_delivery_timeout_ms() -> u64 {
    5_000
}

impl WebhookSubscription {
    pub fn accepts(&self, event: WebhookEvent) -> bool {
        match &self.subscribed_events {
            Some(events) => events.contains(&event),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentNotification {
    pub signature: String,
    pub amount_smallest: u64,
    pub amount_usd: f64,
    pub payer: String,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    pub event: WebhookEvent,
    pub timestamp_ms: i64,
    pub payment: PaymentNotification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueuedDelivery {
    pub id: Uuid,
    pub subscription: WebhookSubscription,
    pub payload: WebhookPayload,
    pub attempts_made: u32,
    pub next_attempt_at_ms: i64,
    pub created_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Outcome of a single delivery attempt (component J's return value).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryAttemptResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub response_time_ms: u64,
    pub attempts: u32,
    pub url: String,
    pub event: WebhookEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryLogEntry {
    pub id: Uuid,
    pub url: String,
    pub event: WebhookEvent,
    pub attempt: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub response_time_ms: u64,
    pub timestamp_ms: i64,
    pub payload: WebhookPayload,
}

// ============================================================================
// Ambient operational types
// ============================================================================

/// Overall and per-dependency health status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub rpc: HealthStatus,
    pub replay_cache: HealthStatus,
    pub webhook_queue: HealthStatus,
    pub timestamp: DateTime<Utc>,
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn overall(rpc: HealthStatus, replay_cache: HealthStatus, webhook_queue: HealthStatus) -> Self {
        let status = if rpc == HealthStatus::Unhealthy
            || replay_cache == HealthStatus::Unhealthy
            || webhook_queue == HealthStatus::Unhealthy
        {
            HealthStatus::Unhealthy
        } else if rpc == HealthStatus::Degraded
            || replay_cache == HealthStatus::Degraded
            || webhook_queue == HealthStatus::Degraded
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            rpc,
            replay_cache,
            webhook_queue,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    #[schema(example = "validation_error")]
    pub r#type: String,
    #[schema(example = "signature must be base58-encoded")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RateLimitResponse {
    pub error: ErrorDetail,
    #[schema(example = 60)]
    pub retry_after: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_exponential_caps_at_max_delay() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            backoff: BackoffKind::Exponential,
        };
        assert_eq!(policy.next_delay_ms(0), 100);
        assert_eq!(policy.next_delay_ms(1), 200);
        assert_eq!(policy.next_delay_ms(2), 400);
        assert_eq!(policy.next_delay_ms(10), 1_000);
    }

    #[test]
    fn retry_policy_linear_grows_additively() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            backoff: BackoffKind::Linear,
        };
        assert_eq!(policy.next_delay_ms(0), 100);
        assert_eq!(policy.next_delay_ms(1), 200);
        assert_eq!(policy.next_delay_ms(2), 300);
    }

    #[test]
    fn proof_payload_untagged_decodes_signature_variant() {
        let json = serde_json::json!({ "signature": "abc123" });
        let payload: ProofPayload = serde_json::from_value(json).unwrap();
        assert_eq!(
            payload,
            ProofPayload::Signature { signature: "abc123".to_string() }
        );
    }

    #[test]
    fn webhook_subscription_with_no_filter_accepts_everything() {
        let sub = WebhookSubscription {
            id: Uuid::nil(),
            url: "https://example.com".to_string(),
            secret: "s".to_string(),
            subscribed_events: None,
            retry_policy: None,
            per_delivery_timeout_ms: 5_000,
            extra_headers: HashMap::new(),
        };
        assert!(sub.accepts(WebhookEvent::PaymentConfirmed));
        assert!(sub.accepts(WebhookEvent::PaymentFailed));
    }
}
