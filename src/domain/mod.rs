//! Domain layer: wire/data types, the crate-wide error type, and the traits
//! that the verification and webhook subsystems depend on rather than reach
//! past.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    AppError, CacheError, ConfigError, ExternalServiceError, QueueError, RpcError,
    ValidationError, VerificationErrorCode,
};
pub use traits::{DefaultRetryClassifier, ReplayCacheBacking, RetryClassifier, RpcClient, WebhookQueueBacking};
pub use types::{
    BackoffKind, Commitment, DeliveryAttemptResult, DeliveryLogEntry, ErrorDetail, ErrorResponse,
    HealthResponse, HealthStatus, Network, PayTo, PaymentDescriptor, PaymentNotification,
    PaymentProof, PaymentReceipt, PaymentRequirements, ParsedTransfer, ProofPayload,
    QueuedDelivery, RateLimitResponse, ReceiptStatus, ReplayCacheEntry, RetryPolicy, Scheme,
    WebhookEvent, WebhookPayload, WebhookSubscription, UNKNOWN_MINT,
};
