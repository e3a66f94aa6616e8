//! Durable retry queue for webhook deliveries (§4.K), with shared (Redis) and
//! in-process backings, plus the manager that drains ready items on a timer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::error::QueueError;
use crate::domain::traits::WebhookQueueBacking;
use crate::domain::types::{QueuedDelivery, WebhookPayload, WebhookSubscription};
use crate::webhook::logger::DeliveryLogger;
use crate::webhook::sender::WebhookSender;

const ITEMS_KEY: &str = "x402:webhook:items";
const SCHEDULE_KEY: &str = "x402:webhook:schedule";

// ============================================================================
// In-process backing
// ============================================================================

pub struct InMemoryWebhookQueue {
    items: Mutex<HashMap<Uuid, QueuedDelivery>>,
    notify: Notify,
}

impl Default for InMemoryWebhookQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWebhookQueue {
    pub fn new() -> Self {
        Self { items: Mutex::new(HashMap::new()), notify: Notify::new() }
    }
}

#[async_trait]
impl WebhookQueueBacking for InMemoryWebhookQueue {
    async fn enqueue(&self, item: QueuedDelivery) -> Result<(), QueueError> {
        self.items.lock().await.insert(item.id, item);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue_ready(&self, now_ms: i64) -> Result<Vec<QueuedDelivery>, QueueError> {
        let mut guard = self.items.lock().await;
        let ready_ids: Vec<Uuid> = guard
            .values()
            .filter(|item| item.next_attempt_at_ms <= now_ms)
            .map(|item| item.id)
            .collect();
        Ok(ready_ids.into_iter().filter_map(|id| guard.remove(&id)).collect())
    }

    async fn retry(&self, item: QueuedDelivery) -> Result<(), QueueError> {
        self.items.lock().await.insert(item.id, item);
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<(), QueueError> {
        self.items.lock().await.remove(&id);
        Ok(())
    }

    async fn size(&self) -> Result<usize, QueueError> {
        Ok(self.items.lock().await.len())
    }

    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

// ============================================================================
// Shared (Redis) backing
// ============================================================================

pub struct RedisWebhookQueue {
    client: redis::Client,
}

impl RedisWebhookQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl WebhookQueueBacking for RedisWebhookQueue {
    async fn enqueue(&self, item: QueuedDelivery) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(&item).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let id = item.id.to_string();
        let _: () = conn
            .hset(ITEMS_KEY, &id, json)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let _: () = conn
            .zadd(SCHEDULE_KEY, &id, item.next_attempt_at_ms)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn dequeue_ready(&self, now_ms: i64) -> Result<Vec<QueuedDelivery>, QueueError> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn
            .zrangebyscore(SCHEDULE_KEY, i64::MIN, now_ms)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let _: () = conn.zrem(SCHEDULE_KEY, &ids).await.map_err(|e| QueueError::Unavailable(e.to_string()))?;

        let mut items = Vec::with_capacity(ids.len());
        for id in &ids {
            let raw: Option<String> =
                conn.hget(ITEMS_KEY, id).await.map_err(|e| QueueError::Unavailable(e.to_string()))?;
            if let Some(json) = raw {
                if let Ok(item) = serde_json::from_str::<QueuedDelivery>(&json) {
                    items.push(item);
                }
            }
        }
        Ok(items)
    }

    async fn retry(&self, item: QueuedDelivery) -> Result<(), QueueError> {
        self.enqueue(item).await
    }

    async fn remove(&self, id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let id = id.to_string();
        let _: () = conn.hdel(ITEMS_KEY, &id).await.map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let _: () = conn.zrem(SCHEDULE_KEY, &id).await.map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn size(&self) -> Result<usize, QueueError> {
        let mut conn = self.connection().await?;
        let count: usize = conn.zcard(SCHEDULE_KEY).await.map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Ok(count)
    }

    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Owns the backing, the sender, and the delivery log; runs the background
/// drain loop that retries whatever the backing reports ready.
pub struct WebhookManager {
    backing: Arc<dyn WebhookQueueBacking>,
    sender: Arc<WebhookSender>,
    logger: Arc<DeliveryLogger>,
    shutdown_tx: watch::Sender<bool>,
}

impl WebhookManager {
    pub fn new(backing: Arc<dyn WebhookQueueBacking>, logger: Arc<DeliveryLogger>) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let manager = Arc::new(Self {
            backing,
            sender: Arc::new(WebhookSender::new()),
            logger,
            shutdown_tx,
        });
        manager.clone().spawn_drain_loop(shutdown_rx);
        manager
    }

    fn spawn_drain_loop(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(error) = self.drain_once().await {
                            warn!(%error, "webhook queue drain failed");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
    }

    async fn drain_once(&self) -> Result<(), QueueError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let ready = self.backing.dequeue_ready(now_ms).await?;
        for item in ready {
            self.attempt_delivery(item).await;
        }
        Ok(())
    }

    async fn attempt_delivery(&self, mut item: QueuedDelivery) {
        if !item.subscription.accepts(item.payload.event) {
            return;
        }

        let attempts = item.attempts_made + 1;
        let result = self.sender.send(&item.subscription, &item.payload, attempts).await;
        self.logger.log(&item.subscription, &item.payload, attempts, &result).await;

        if result.success {
            info!(subscription = %item.subscription.id, attempts, "webhook delivered");
            return;
        }

        item.attempts_made = attempts;
        item.last_error = result.error.clone();

        let max_attempts =
            item.subscription.retry_policy.as_ref().map(|p| p.max_attempts).unwrap_or(1);
        if attempts >= max_attempts {
            warn!(subscription = %item.subscription.id, attempts, "webhook delivery exhausted retries");
            return;
        }

        let delay_ms = item
            .subscription
            .retry_policy
            .as_ref()
            .map(|p| p.next_delay_ms(item.attempts_made))
            .unwrap_or(5_000);
        item.next_attempt_at_ms = chrono::Utc::now().timestamp_millis() + delay_ms as i64;

        if let Err(error) = self.backing.retry(item).await {
            warn!(%error, "failed to reschedule webhook delivery");
        }
    }

    /// Delivers immediately, without going through the queue. On failure,
    /// enqueues a retry if the subscription has a retry policy.
    pub async fn send(&self, subscription: &WebhookSubscription, payload: WebhookPayload) {
        if !subscription.accepts(payload.event) {
            debug!(subscription = %subscription.id, "subscription does not accept this event");
            return;
        }

        let result = self.sender.send(subscription, &payload, 1).await;
        self.logger.log(subscription, &payload, 1, &result).await;

        if result.success {
            return;
        }

        if let Some(policy) = &subscription.retry_policy {
            let now_ms = chrono::Utc::now().timestamp_millis();
            let item = QueuedDelivery {
                id: Uuid::new_v4(),
                subscription: subscription.clone(),
                payload,
                attempts_made: 1,
                next_attempt_at_ms: now_ms + policy.next_delay_ms(1) as i64,
                created_at_ms: now_ms,
                last_error: result.error,
            };
            if let Err(error) = self.backing.enqueue(item).await {
                warn!(%error, "failed to enqueue webhook for retry");
            }
        }
    }

    /// Fire-and-forget: spawns [`Self::send`] without awaiting it, so the
    /// caller's request path never blocks on webhook delivery.
    pub fn send_async(self: &Arc<Self>, subscription: WebhookSubscription, payload: WebhookPayload) {
        let manager = self.clone();
        tokio::spawn(async move {
            manager.send(&subscription, payload).await;
        });
    }

    pub async fn queue_size(&self) -> Result<usize, QueueError> {
        self.backing.size().await
    }

    pub async fn close(&self) -> Result<(), QueueError> {
        let _ = self.shutdown_tx.send(true);
        self.backing.close().await
    }
}
