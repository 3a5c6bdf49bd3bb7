use std::sync::Arc;

use anyhow::Result;
use market::cache::{CacheStore, MemoryStore, QuoteCache, RedisStore};
use market::clock::SystemClock;
use market::{DigestService, MarketDataClient, Throttle};
use tracing::info;

pub mod command;
pub mod config;
pub mod delivery;

use config::Config;

pub struct Data {
    pub digest: Arc<DigestService>,
    pub config: Config,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Wire the digest service from configuration. Falls back to an in-process
/// cache when no Redis is configured.
pub async fn build_digest(config: &Config) -> Result<DigestService> {
    let store: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => {
            info!("using redis cache store");
            Arc::new(RedisStore::new(url, config.redis_key_prefix.clone()).await?)
        }
        None => {
            info!("REDIS_URL not set, using in-memory cache store");
            Arc::new(MemoryStore::new())
        }
    };

    let throttle = Arc::new(Throttle::new(config.provider_min_interval));
    let cache = QuoteCache::new(store, Arc::new(SystemClock), throttle)
        .with_retention(config.cache_retention);

    let provider = MarketDataClient::new(
        config.market_api_base.clone(),
        config.market_api_key.clone(),
    )?;

    Ok(DigestService::new(Arc::new(provider), cache, config.ttl).with_source(config.rsi_source))
}
