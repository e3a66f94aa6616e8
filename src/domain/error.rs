//! Application-wide error types.

use thiserror::Error;

/// The closed taxonomy of verification failures.
///
/// Every `Invalid` verdict the orchestrator produces carries exactly one of
/// these codes; no other component invents its own verification code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum VerificationErrorCode {
    InvalidHeader,
    ReplayAttack,
    TxNotFound,
    TxFailed,
    NoUsdcTransfer,
    TransferMismatch,
    InsufficientAmount,
    WrongToken,
    TxExpired,
    VerificationError,
}

impl VerificationErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidHeader => "InvalidHeader",
            Self::ReplayAttack => "ReplayAttack",
            Self::TxNotFound => "TxNotFound",
            Self::TxFailed => "TxFailed",
            Self::NoUsdcTransfer => "NoUsdcTransfer",
            Self::TransferMismatch => "TransferMismatch",
            Self::InsufficientAmount => "InsufficientAmount",
            Self::WrongToken => "WrongToken",
            Self::TxExpired => "TxExpired",
            Self::VerificationError => "VerificationError",
        }
    }
}

impl std::fmt::Display for VerificationErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors surfaced by the replay-cache backings (§4.E).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache backend returned malformed data: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the webhook queue backings (§4.K).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),
    #[error("queue item {0} not found")]
    NotFound(String),
}

/// Errors surfaced by the RPC client (§4.M).
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("rpc returned an error response: {0}")]
    Remote(String),
    #[error("rpc response could not be decoded: {0}")]
    Decode(String),
    #[error("rpc call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Configuration errors raised while loading `Config` from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Validation errors for malformed wire input (headers, admin requests).
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Malformed(String),
}

/// Errors from the webhook transport layer and ambient external services.
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("external service unavailable: {0}")]
    Unavailable(String),
    #[error("external service timed out: {0}")]
    Timeout(String),
    #[error("external service rate limited us: {0}")]
    RateLimited(String),
    #[error("external service error: {0}")]
    Other(String),
}

/// The crate-wide error type for the ambient (non-verification-verdict) surface.
///
/// Verification failures are represented as `VerificationVerdict::Invalid`
/// values, not as `AppError`; `AppError::Verification` exists only so a
/// verification failure can be logged or propagated through the same
/// `tracing`/`?`-based plumbing as every other ambient error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("verification failed: {0}")]
    Verification(VerificationErrorCode),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("external service error: {0}")]
    ExternalService(#[from] ExternalServiceError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("rate limit exceeded")]
    RateLimited,
}
