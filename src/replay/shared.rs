//! Redis-backed replay cache (§4.E): safe across process instances, bounded
//! by the key's own TTL rather than any sweeper.

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::domain::error::CacheError;
use crate::domain::traits::ReplayCacheBacking;
use crate::domain::types::ReplayCacheEntry;

const KEY_PREFIX: &str = "x402:payment:";

fn key_for(signature: &str) -> String {
    format!("{KEY_PREFIX}{signature}")
}

pub struct RedisReplayCache {
    client: redis::Client,
    ttl_seconds: u64,
}

impl RedisReplayCache {
    pub fn new(redis_url: &str, ttl_seconds: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self { client, ttl_seconds })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ReplayCacheBacking for RedisReplayCache {
    async fn is_used(&self, signature: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let exists: bool = conn
            .exists(key_for(signature))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(exists)
    }

    async fn mark_used(&self, signature: &str, entry: ReplayCacheEntry) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(&entry).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        let () = conn
            .set_ex(key_for(signature), payload, self.ttl_seconds)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn get_meta(&self, signature: &str) -> Result<Option<ReplayCacheEntry>, CacheError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .get(key_for(signature))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| CacheError::Corrupt(e.to_string())),
        }
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn
            .keys(format!("{KEY_PREFIX}*"))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        if keys.is_empty() {
            return Ok(());
        }
        let _: () = conn.del(keys).await.map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        // The multiplexed connection is reopened per call; nothing to tear down.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Requires a reachable Redis instance: `REDIS_TEST_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn mark_used_then_is_used_round_trips_against_live_redis() {
        let url = std::env::var("REDIS_TEST_URL").expect("REDIS_TEST_URL must be set for this test");
        let cache = RedisReplayCache::new(&url, 60).unwrap();
        let signature = format!("test-sig-{}", uuid::Uuid::new_v4());

        assert!(!cache.is_used(&signature).await.unwrap());

        let entry = ReplayCacheEntry {
            recipient: "Dest1111111111111111111111111111111111111".to_string(),
            amount: 1_000,
            consumed_at_ms: 0,
            payer: None,
        };
        cache.mark_used(&signature, entry.clone()).await.unwrap();

        assert!(cache.is_used(&signature).await.unwrap());
        assert_eq!(cache.get_meta(&signature).await.unwrap(), Some(entry));
    }
}
