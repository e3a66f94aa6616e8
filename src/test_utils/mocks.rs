//! Mock backings for testing callers of this crate (feature `test-utils`).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::chain::rpc::TransactionResponse;
use crate::domain::error::{CacheError, QueueError, RpcError};
use crate::domain::traits::{ReplayCacheBacking, RpcClient, WebhookQueueBacking};
use crate::domain::types::{Commitment, QueuedDelivery, ReplayCacheEntry};

/// Shared "should this call fail" toggle used by every mock in this module.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self { should_fail: true, error_message: Some(message.into()) }
    }
}

/// An `RpcClient` that returns a fixed, injected transaction.
pub struct MockRpcClient {
    transaction: Mutex<Option<TransactionResponse>>,
    balance: Mutex<Option<u64>>,
    config: MockConfig,
    is_healthy: AtomicBool,
}

impl MockRpcClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            transaction: Mutex::new(None),
            balance: Mutex::new(None),
            config: MockConfig::success(),
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self { config: MockConfig::failure(message), ..Self::new() }
    }

    pub fn set_transaction(&self, tx: TransactionResponse) {
        *self.transaction.lock().unwrap() = Some(tx);
    }

    pub fn set_balance(&self, amount: u64) {
        *self.balance.lock().unwrap() = Some(amount);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    fn check_should_fail(&self) -> Result<(), RpcError> {
        if self.config.should_fail {
            return Err(RpcError::Transport(
                self.config.error_message.clone().unwrap_or_else(|| "mock rpc error".to_string()),
            ));
        }
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(RpcError::Transport("mock rpc unhealthy".to_string()));
        }
        Ok(())
    }
}

impl Default for MockRpcClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcClient for MockRpcClient {
    async fn get_transaction(
        &self,
        _signature: &str,
        _commitment: Commitment,
    ) -> Result<Option<TransactionResponse>, RpcError> {
        self.check_should_fail()?;
        Ok(self.transaction.lock().unwrap().clone())
    }

    async fn get_token_account_balance(&self, _address: &str) -> Result<Option<u64>, RpcError> {
        self.check_should_fail()?;
        Ok(*self.balance.lock().unwrap())
    }
}

/// A `ReplayCacheBacking` that tracks consumed signatures in memory, with an
/// injectable failure mode for exercising the orchestrator's fail-open path.
pub struct MockReplayCache {
    used: Mutex<HashMap<String, ReplayCacheEntry>>,
    config: MockConfig,
}

impl MockReplayCache {
    #[must_use]
    pub fn new() -> Self {
        Self { used: Mutex::new(HashMap::new()), config: MockConfig::success() }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self { used: Mutex::new(HashMap::new()), config: MockConfig::failure(message) }
    }

    fn check_should_fail(&self) -> Result<(), CacheError> {
        if self.config.should_fail {
            return Err(CacheError::Unavailable(
                self.config.error_message.clone().unwrap_or_else(|| "mock cache error".to_string()),
            ));
        }
        Ok(())
    }
}

impl Default for MockReplayCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplayCacheBacking for MockReplayCache {
    async fn is_used(&self, signature: &str) -> Result<bool, CacheError> {
        self.check_should_fail()?;
        Ok(self.used.lock().unwrap().contains_key(signature))
    }

    async fn mark_used(&self, signature: &str, entry: ReplayCacheEntry) -> Result<(), CacheError> {
        self.check_should_fail()?;
        self.used.lock().unwrap().insert(signature.to_string(), entry);
        Ok(())
    }

    async fn get_meta(&self, signature: &str) -> Result<Option<ReplayCacheEntry>, CacheError> {
        self.check_should_fail()?;
        Ok(self.used.lock().unwrap().get(signature).cloned())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.used.lock().unwrap().clear();
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// A `WebhookQueueBacking` that stores items in a plain `HashMap`, with no
/// background draining — tests call `dequeue_ready` explicitly.
pub struct MockWebhookQueue {
    items: Mutex<HashMap<Uuid, QueuedDelivery>>,
    removed: Mutex<HashSet<Uuid>>,
}

impl MockWebhookQueue {
    #[must_use]
    pub fn new() -> Self {
        Self { items: Mutex::new(HashMap::new()), removed: Mutex::new(HashSet::new()) }
    }

    pub fn was_removed(&self, id: Uuid) -> bool {
        self.removed.lock().unwrap().contains(&id)
    }
}

impl Default for MockWebhookQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookQueueBacking for MockWebhookQueue {
    async fn enqueue(&self, item: QueuedDelivery) -> Result<(), QueueError> {
        self.items.lock().unwrap().insert(item.id, item);
        Ok(())
    }

    async fn dequeue_ready(&self, now_ms: i64) -> Result<Vec<QueuedDelivery>, QueueError> {
        let mut guard = self.items.lock().unwrap();
        let ready_ids: Vec<Uuid> =
            guard.values().filter(|i| i.next_attempt_at_ms <= now_ms).map(|i| i.id).collect();
        Ok(ready_ids.into_iter().filter_map(|id| guard.remove(&id)).collect())
    }

    async fn retry(&self, item: QueuedDelivery) -> Result<(), QueueError> {
        self.items.lock().unwrap().insert(item.id, item);
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<(), QueueError> {
        self.items.lock().unwrap().remove(&id);
        self.removed.lock().unwrap().insert(id);
        Ok(())
    }

    async fn size(&self) -> Result<usize, QueueError> {
        Ok(self.items.lock().unwrap().len())
    }

    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
