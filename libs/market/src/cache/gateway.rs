use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::{CacheEntry, CacheKey, CacheStore, within_ttl};
use crate::clock::Clock;
use crate::error::ProviderError;
use crate::throttle::Throttle;

/// Outcome of a cached lookup.
///
/// Callers that only care about the value use [`Fetched::into_value`]; the
/// variants keep "provider is down" apart from "nothing to show" for logging
/// and tests.
#[derive(Debug)]
pub enum Fetched<T> {
    /// Served from cache inside its ttl, no provider call was made.
    Fresh(T),
    /// Fetched from the provider and written back.
    Refreshed(T),
    /// Refresh failed, the last known value is returned as is.
    Stale { value: T, reason: ProviderError },
    /// Refresh failed and nothing was cached.
    Missing { reason: ProviderError },
}

impl<T> Fetched<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            Fetched::Fresh(v) | Fetched::Refreshed(v) | Fetched::Stale { value: v, .. } => Some(v),
            Fetched::Missing { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Fetched::Stale { .. } | Fetched::Missing { .. })
    }

    pub fn failure(&self) -> Option<&ProviderError> {
        match self {
            Fetched::Stale { reason, .. } | Fetched::Missing { reason } => Some(reason),
            _ => None,
        }
    }
}

struct Cached<T> {
    value: T,
    timestamp: DateTime<Utc>,
}

/// TTL cache in front of the market-data provider.
///
/// Provider and store failures never escape: a failed refresh falls back to
/// whatever was stored last, however old.
#[derive(Clone)]
pub struct QuoteCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    throttle: Arc<Throttle>,
    retention: Option<std::time::Duration>,
}

impl QuoteCache {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>, throttle: Arc<Throttle>) -> Self {
        Self {
            store,
            clock,
            throttle,
            retention: None,
        }
    }

    /// How long the store keeps entries around after a write. Must be well
    /// past every ttl or stale fallbacks disappear with the key.
    pub fn with_retention(mut self, retention: std::time::Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub async fn fetch_with_cache<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Fetched<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let cached = match self.load::<T>(key).await {
            Some(c) if within_ttl(c.timestamp, self.clock.now(), ttl) => {
                debug!(key = %key, "cache hit");
                return Fetched::Fresh(c.value);
            }
            other => other,
        };

        let result = {
            let _permit = self.throttle.acquire().await;
            fetch().await
        };

        match result {
            Ok(value) => {
                self.save(key, &value).await;
                debug!(key = %key, "cache refreshed");
                Fetched::Refreshed(value)
            }
            Err(reason) => {
                warn!(
                    key = %key,
                    error = %reason,
                    has_fallback = cached.is_some(),
                    "provider fetch failed"
                );
                match cached {
                    Some(c) => Fetched::Stale {
                        value: c.value,
                        reason,
                    },
                    None => Fetched::Missing { reason },
                }
            }
        }
    }

    async fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<Cached<T>> {
        let raw = match self.store.get(&key.to_string()).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %key, error = ?e, "cache read failed");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "discarding unreadable cache entry");
                return None;
            }
        };

        match serde_json::from_value(entry.value) {
            Ok(value) => Some(Cached {
                value,
                timestamp: entry.timestamp,
            }),
            Err(e) => {
                warn!(key = %key, error = %e, "cached value has unexpected shape");
                None
            }
        }
    }

    async fn save<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let entry = match serde_json::to_value(value) {
            Ok(value) => CacheEntry {
                value,
                timestamp: self.clock.now(),
            },
            Err(e) => {
                warn!(key = %key, error = %e, "value not serializable, skipping cache write");
                return;
            }
        };

        let payload = match serde_json::to_string(&entry) {
            Ok(p) => p,
            Err(e) => {
                warn!(key = %key, error = %e, "cache entry not serializable");
                return;
            }
        };

        if let Err(e) = self.store.put(&key.to_string(), payload, self.retention).await {
            warn!(key = %key, error = ?e, "cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryStore;
    use crate::clock::ManualClock;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn setup() -> (QuoteCache, Arc<MemoryStore>, Arc<ManualClock>) {
        setup_throttled(std::time::Duration::ZERO)
    }

    fn setup_throttled(
        min_interval: std::time::Duration,
    ) -> (QuoteCache, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let throttle = Arc::new(Throttle::new(min_interval));
        let cache = QuoteCache::new(store.clone(), clock.clone(), throttle);
        (cache, store, clock)
    }

    fn quota() -> ProviderError {
        ProviderError::QuotaExceeded("out of credits".into())
    }

    async fn stored_entry(store: &MemoryStore, key: &CacheKey) -> CacheEntry {
        let raw = store.get(&key.to_string()).await.unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_cache() {
        let (cache, _, clock) = setup();
        let key = CacheKey::price("SPY");
        let ttl = Duration::minutes(5);
        let calls = AtomicUsize::new(0);

        let first = cache
            .fetch_with_cache(&key, ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(410.5)
            })
            .await;
        assert!(matches!(first, Fetched::Refreshed(v) if v == 410.5));

        clock.advance(Duration::minutes(4));
        let second: Fetched<f64> = cache
            .fetch_with_cache(&key, ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(quota())
            })
            .await;

        assert!(matches!(second, Fetched::Fresh(v) if v == 410.5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_are_spaced_but_hits_are_not() {
        use tokio::time::Instant;

        let gap = std::time::Duration::from_secs(8);
        let (cache, _, _) = setup_throttled(gap);
        let spy = CacheKey::price("SPY");
        let btc = CacheKey::price("BTC/USD");
        let ttl = Duration::minutes(5);

        let start = Instant::now();
        let first = cache.fetch_with_cache(&spy, ttl, || async { Ok(410.5) }).await;
        assert!(matches!(first, Fetched::Refreshed(_)));
        assert_eq!(Instant::now(), start);

        let second = cache.fetch_with_cache(&btc, ttl, || async { Ok(64000.0) }).await;
        assert!(matches!(second, Fetched::Refreshed(_)));
        assert!(Instant::now() - start >= gap);

        // a fresh hit right after a refresh does not wait on the throttle
        let before = Instant::now();
        let hit: Fetched<f64> = cache
            .fetch_with_cache(&spy, ttl, || async { Err(quota()) })
            .await;
        assert!(matches!(hit, Fetched::Fresh(v) if v == 410.5));
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test]
    async fn missing_entry_and_failed_fetch_gives_none() {
        let (cache, store, _) = setup();
        let key = CacheKey::price("SPY");

        let got: Fetched<f64> = cache
            .fetch_with_cache(&key, Duration::minutes(5), || async { Err(quota()) })
            .await;

        assert!(got.is_degraded());
        assert!(got.failure().is_some_and(ProviderError::is_quota));
        assert_eq!(got.into_value(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn stale_refresh_success_replaces_value_and_timestamp() {
        let (cache, store, clock) = setup();
        let key = CacheKey::rsi("1day", "SPY");
        let ttl = Duration::hours(1);

        let _ = cache.fetch_with_cache(&key, ttl, || async { Ok(55.0) }).await;
        clock.advance(Duration::hours(2));

        let got = cache.fetch_with_cache(&key, ttl, || async { Ok(61.0) }).await;
        assert!(matches!(got, Fetched::Refreshed(v) if v == 61.0));

        let entry = stored_entry(&store, &key).await;
        assert_eq!(entry.value, serde_json::json!(61.0));
        assert_eq!(entry.timestamp, t0() + Duration::hours(2));
    }

    #[tokio::test]
    async fn stale_refresh_failure_keeps_old_value_and_timestamp() {
        let (cache, store, clock) = setup();
        let key = CacheKey::rsi("1day", "SPY");
        let ttl = Duration::hours(1);

        let _ = cache.fetch_with_cache(&key, ttl, || async { Ok(55.0) }).await;
        clock.advance(Duration::hours(2));

        let got: Fetched<f64> = cache
            .fetch_with_cache(&key, ttl, || async {
                Err(ProviderError::Malformed("missing values".into()))
            })
            .await;
        assert!(matches!(got, Fetched::Stale { value, .. } if value == 55.0));

        let entry = stored_entry(&store, &key).await;
        assert_eq!(entry.timestamp, t0());

        // still stale on the next call, so the provider is asked again
        let calls = AtomicUsize::new(0);
        let again = cache
            .fetch_with_cache(&key, ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(57.0)
            })
            .await;
        assert!(matches!(again, Fetched::Refreshed(v) if v == 57.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreadable_entry_counts_as_missing() {
        let (cache, store, _) = setup();
        let key = CacheKey::price("SPY");
        store.put(&key.to_string(), "not json".into(), None).await.unwrap();

        let got = cache
            .fetch_with_cache(&key, Duration::minutes(5), || async { Ok(1.0) })
            .await;
        assert!(matches!(got, Fetched::Refreshed(_)));
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("connection refused")
        }

        async fn put(
            &self,
            _key: &str,
            _value: String,
            _ttl: Option<std::time::Duration>,
        ) -> Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn store_failures_are_absorbed() {
        let cache = QuoteCache::new(
            Arc::new(BrokenStore),
            Arc::new(ManualClock::new(t0())),
            Arc::new(Throttle::new(std::time::Duration::ZERO)),
        );
        let key = CacheKey::price("SPY");

        let ok = cache.fetch_with_cache(&key, Duration::minutes(5), || async { Ok(2.0) }).await;
        assert_eq!(ok.into_value(), Some(2.0));

        let failed: Fetched<f64> = cache
            .fetch_with_cache(&key, Duration::minutes(5), || async { Err(quota()) })
            .await;
        assert!(matches!(failed, Fetched::Missing { .. }));
    }
}
