mod gateway;
mod redis;
mod store;

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub use gateway::{Fetched, QuoteCache};
pub use redis::RedisStore;
pub use store::{CacheStore, MemoryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Price,
    Rsi,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Price => "PRICE",
            DataKind::Rsi => "RSI",
        }
    }
}

/// Identifies one cached lookup: what was fetched, at which interval, for
/// which symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: DataKind,
    pub interval: String,
    pub symbol: String,
}

impl CacheKey {
    pub fn new(kind: DataKind, interval: impl Into<String>, symbol: &str) -> Self {
        Self {
            kind,
            interval: interval.into(),
            symbol: symbol.trim().to_uppercase(),
        }
    }

    pub fn price(symbol: &str) -> Self {
        Self::new(DataKind::Price, "quote", symbol)
    }

    pub fn rsi(interval: &str, symbol: &str) -> Self {
        Self::new(DataKind::Rsi, interval, symbol)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind.as_str(), self.interval, self.symbol)
    }
}

/// Freshness window per data kind.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtl {
    pub price: Duration,
    pub rsi: Duration,
}

impl CacheTtl {
    pub fn for_kind(&self, kind: DataKind) -> Duration {
        match kind {
            DataKind::Price => self.price,
            DataKind::Rsi => self.rsi,
        }
    }
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            price: Duration::minutes(5),
            rsi: Duration::hours(1),
        }
    }
}

/// Stored form of a cached value, serialized as a JSON blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        within_ttl(self.timestamp, now, ttl)
    }
}

/// Fresh while `now - timestamp <= ttl`.
pub(crate) fn within_ttl(timestamp: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - timestamp <= ttl
}
