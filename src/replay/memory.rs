//! In-process replay cache (§4.E): a `DashMap` guarded by `entry()` so
//! concurrent `mark_used` calls for the same signature can't both win, plus a
//! background sweeper that evicts anything past its TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Notify;
use tracing::debug;

use crate::domain::error::CacheError;
use crate::domain::traits::ReplayCacheBacking;
use crate::domain::types::ReplayCacheEntry;

struct Slot {
    entry: ReplayCacheEntry,
    expires_at_ms: i64,
}

pub struct InMemoryReplayCache {
    entries: Arc<DashMap<String, Slot>>,
    ttl_ms: i64,
    shutdown: Arc<Notify>,
}

impl InMemoryReplayCache {
    pub fn new(ttl_ms: i64) -> Self {
        let entries = Arc::new(DashMap::new());
        let shutdown = Arc::new(Notify::new());
        spawn_sweeper(entries.clone(), shutdown.clone());
        Self { entries, ttl_ms, shutdown }
    }

    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl Drop for InMemoryReplayCache {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

fn spawn_sweeper(entries: Arc<DashMap<String, Slot>>, shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(30)) => {
                    let now = chrono::Utc::now().timestamp_millis();
                    let expired: Vec<String> = entries
                        .iter()
                        .filter(|kv| kv.value().expires_at_ms <= now)
                        .map(|kv| kv.key().clone())
                        .collect();
                    for key in expired {
                        entries.remove(&key);
                    }
                    debug!(remaining = entries.len(), "replay cache sweep complete");
                }
                _ = shutdown.notified() => break,
            }
        }
    });
}

#[async_trait]
impl ReplayCacheBacking for InMemoryReplayCache {
    async fn is_used(&self, signature: &str) -> Result<bool, CacheError> {
        let now = self.now_ms();
        Ok(self
            .entries
            .get(signature)
            .map(|slot| slot.expires_at_ms > now)
            .unwrap_or(false))
    }

    async fn mark_used(&self, signature: &str, entry: ReplayCacheEntry) -> Result<(), CacheError> {
        let expires_at_ms = self.now_ms() + self.ttl_ms;
        match self.entries.entry(signature.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().expires_at_ms > self.now_ms() => {
                let _ = &mut occupied;
                Err(CacheError::Corrupt(format!("signature {signature} already consumed")))
            }
            Entry::Occupied(mut occupied) => {
                occupied.insert(Slot { entry, expires_at_ms });
                Ok(())
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot { entry, expires_at_ms });
                Ok(())
            }
        }
    }

    async fn get_meta(&self, signature: &str) -> Result<Option<ReplayCacheEntry>, CacheError> {
        Ok(self.entries.get(signature).map(|slot| slot.entry.clone()))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.shutdown.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ReplayCacheEntry {
        ReplayCacheEntry { recipient: "R".to_string(), amount: 1_000, consumed_at_ms: 0, payer: None }
    }

    #[tokio::test]
    async fn fresh_signature_is_not_used() {
        let cache = InMemoryReplayCache::new(60_000);
        assert!(!cache.is_used("sig").await.unwrap());
    }

    #[tokio::test]
    async fn mark_used_then_is_used_reports_true() {
        let cache = InMemoryReplayCache::new(60_000);
        cache.mark_used("sig", entry()).await.unwrap();
        assert!(cache.is_used("sig").await.unwrap());
    }

    #[tokio::test]
    async fn marking_an_already_consumed_signature_twice_fails() {
        let cache = InMemoryReplayCache::new(60_000);
        cache.mark_used("sig", entry()).await.unwrap();
        assert!(cache.mark_used("sig", entry()).await.is_err());
    }

    #[tokio::test]
    async fn expired_entries_no_longer_count_as_used() {
        let cache = InMemoryReplayCache::new(-1);
        cache.mark_used("sig", entry()).await.unwrap();
        assert!(!cache.is_used("sig").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_mark_used_for_same_signature_only_one_succeeds() {
        let cache = Arc::new(InMemoryReplayCache::new(60_000));
        let a = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.mark_used("sig", entry()).await })
        };
        let b = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.mark_used("sig", entry()).await })
        };
        let (a, b) = tokio::join!(a, b);
        let successes = [a.unwrap(), b.unwrap()].into_iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
    }
}
