//! Contracts for the pluggable backings and external collaborators.

use async_trait::async_trait;

use crate::chain::rpc::TransactionResponse;
use crate::domain::error::{CacheError, QueueError, RpcError};
use crate::domain::types::{Commitment, QueuedDelivery, ReplayCacheEntry};

/// At-most-once signature consumption (§4.E).
///
/// Two implementations are provided: [`crate::replay::shared::RedisReplayCache`]
/// (safe across process instances) and [`crate::replay::memory::InMemoryReplayCache`]
/// (single-process only).
#[async_trait]
pub trait ReplayCacheBacking: Send + Sync {
    async fn is_used(&self, signature: &str) -> Result<bool, CacheError>;

    async fn mark_used(&self, signature: &str, entry: ReplayCacheEntry) -> Result<(), CacheError>;

    async fn get_meta(&self, signature: &str) -> Result<Option<ReplayCacheEntry>, CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    async fn close(&self) -> Result<(), CacheError>;
}

/// Durable retry queue for webhook deliveries (§4.K).
#[async_trait]
pub trait WebhookQueueBacking: Send + Sync {
    async fn enqueue(&self, item: QueuedDelivery) -> Result<(), QueueError>;

    /// Items whose `next_attempt_at_ms <= now_ms` are eligible for delivery.
    async fn dequeue_ready(&self, now_ms: i64) -> Result<Vec<QueuedDelivery>, QueueError>;

    async fn retry(&self, item: QueuedDelivery) -> Result<(), QueueError>;

    async fn remove(&self, id: uuid::Uuid) -> Result<(), QueueError>;

    async fn size(&self) -> Result<usize, QueueError>;

    async fn close(&self) -> Result<(), QueueError>;
}

/// The two Solana RPC query kinds this toolkit depends on (§4.M, §6).
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn get_transaction(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<Option<TransactionResponse>, RpcError>;

    async fn get_token_account_balance(&self, address: &str) -> Result<Option<u64>, RpcError>;
}

/// Maps a concrete error into whether the retry engine (§4.D) should retry it.
///
/// The default implementation recognizes network-transport failures and the
/// RPC-specific transient messages named in §4.D; callers may substitute a
/// stricter or looser classifier by implementing this trait directly.
pub trait RetryClassifier: Send + Sync {
    fn is_retryable(&self, error: &str) -> bool;
}

/// The classifier used unless a caller supplies their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryClassifier;

impl RetryClassifier for DefaultRetryClassifier {
    fn is_retryable(&self, error: &str) -> bool {
        const TRANSIENT_SUBSTRINGS: &[&str] = &[
            "timed out",
            "timeout",
            "connection refused",
            "dns error",
            "429",
            "502",
            "503",
            "504",
            "node is behind",
            "transaction not found",
            "blockhash not found",
        ];
        let lower = error.to_lowercase();
        TRANSIENT_SUBSTRINGS.iter().any(|needle| lower.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_classifier_flags_timeouts_and_rpc_messages() {
        let c = DefaultRetryClassifier;
        assert!(c.is_retryable("request timed out"));
        assert!(c.is_retryable("Transaction not found"));
        assert!(c.is_retryable("got HTTP 503"));
        assert!(!c.is_retryable("invalid signature format"));
    }
}
