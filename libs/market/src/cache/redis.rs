use std::time::Duration;

use anyhow::{Error, Result};
use async_trait::async_trait;
use fred::prelude::*;
use fred::types::Expiration;
use tracing::error;

use super::CacheStore;

#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    key_prefix: String,
}

impl RedisStore {
    pub async fn new(redis_url: &str, key: impl Into<String>) -> Result<Self, Error> {
        let config = Config::from_url(redis_url)?;

        let client = Builder::from_config(config)
            .with_connection_config(|config| {
                config.connection_timeout = Duration::from_secs(5);
                config.tcp = TcpConfig {
                    nodelay: Some(true),
                    ..Default::default()
                };
            })
            .build()?;

        client.on_error(|(error, server)| async move {
            error!(?server, ?error, "redis connection error");
            Ok(())
        });

        client.connect();
        client.wait_for_connect().await?;

        Ok(Self {
            client,
            key_prefix: key.into(),
        })
    }

    /// Create a new RedisStore from environment variables.
    /// Expects REDIS_URL to be set; REDIS_KEY_PREFIX defaults to `marketbot`.
    pub async fn from_env() -> Result<Self, Error> {
        use std::env;

        let redis_url = env::var("REDIS_URL")
            .map_err(|_| Error::msg("REDIS_URL environment variable not set"))?;
        let key_prefix = env::var("REDIS_KEY_PREFIX").unwrap_or_else(|_| "marketbot".to_string());

        Self::new(&redis_url, key_prefix).await
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.client
            .get(self.cache_key(key))
            .await
            .map_err(Error::from)
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let expire = ttl.map(|ttl| Expiration::EX(expire_secs(ttl)));

        let _: () = self
            .client
            .set(self.cache_key(key), value, expire, None, false)
            .await?;

        Ok(())
    }
}

/// `EX` takes whole seconds, at least one; huge ttls saturate.
fn expire_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_clamped_to_redis_range() {
        assert_eq!(expire_secs(Duration::ZERO), 1);
        assert_eq!(expire_secs(Duration::from_millis(1500)), 1);
        assert_eq!(expire_secs(Duration::from_secs(7 * 24 * 3600)), 604_800);
        assert_eq!(expire_secs(Duration::MAX), i64::MAX);
    }
}
