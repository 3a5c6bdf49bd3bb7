use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Key-value backend behind the cache gateway.
///
/// Values are opaque strings (JSON blobs). `ttl` lets backends with native
/// expiry drop keys on their own; it is a retention hint, not the freshness
/// window.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;
}

struct Slot {
    value: String,
    expire_at: Option<Instant>,
}

/// Process-local store, used when no Redis is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.map.read().await;
        let value = map
            .get(key)
            .filter(|slot| slot.expire_at.is_none_or(|at| Instant::now() < at))
            .map(|slot| slot.value.clone());
        Ok(value)
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let expire_at = ttl.map(|ttl| Instant::now() + ttl);
        self.map
            .write()
            .await
            .insert(key.to_string(), Slot { value, expire_at });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_after_write() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.put("a", "1".into(), None).await.unwrap();
        store.put("a", "2".into(), None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn honours_retention_ttl() {
        let store = MemoryStore::new();
        store
            .put("k", "v".into(), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }
}
