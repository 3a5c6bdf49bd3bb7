use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use chrono_tz::Tz;
use market::RsiSource;
use market::cache::CacheTtl;

#[derive(Clone, Debug)]
pub struct Config {
    pub discord_token: String,
    pub version: String,
    /// Channels the bot answers in and delivers scheduled digests to.
    pub allowed_channels: Vec<u64>,
    pub digest_cron: String,
    pub digest_tz: Tz,
    pub market_api_base: String,
    pub market_api_key: String,
    pub provider_min_interval: Duration,
    pub ttl: CacheTtl,
    pub cache_retention: Duration,
    pub rsi_source: RsiSource,
    pub redis_url: Option<String>,
    pub redis_key_prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let allowed_channels = parse_channel_ids(&var("ALLOWED_CHANNEL_IDS").unwrap_or_default())?;

        let digest_tz = env_or("DIGEST_TZ", "UTC")
            .parse::<Tz>()
            .map_err(|e| anyhow!("invalid DIGEST_TZ: {e}"))?;

        let ttl = CacheTtl {
            price: chrono::Duration::seconds(env_parse("PRICE_TTL_SECS", 300)?),
            rsi: chrono::Duration::seconds(env_parse("RSI_TTL_SECS", 3600)?),
        };

        Ok(Self {
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?,
            version: env_or("APP_VERSION", "Unknown"),
            allowed_channels,
            digest_cron: env_or("DIGEST_CRON", "0 0 9 * * *"),
            digest_tz,
            market_api_base: env_or("MARKET_API_BASE_URL", "https://api.twelvedata.com"),
            market_api_key: var("MARKET_API_KEY").context("MARKET_API_KEY not set")?,
            provider_min_interval: Duration::from_millis(env_parse(
                "PROVIDER_MIN_INTERVAL_MS",
                8000,
            )?),
            ttl,
            cache_retention: Duration::from_secs(env_parse("CACHE_RETENTION_SECS", 604_800)?),
            rsi_source: env_or("RSI_SOURCE", "local").parse()?,
            redis_url: var("REDIS_URL").ok().filter(|s| !s.trim().is_empty()),
            redis_key_prefix: env_or("REDIS_KEY_PREFIX", "marketbot"),
        })
    }

    pub fn is_allowed(&self, channel_id: u64) -> bool {
        self.allowed_channels.contains(&channel_id)
    }
}

fn env_or(name: &str, default: &str) -> String {
    var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name).ok().filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {name}={raw}: {e}")),
        None => Ok(default),
    }
}

/// Comma-separated channel ids, blanks ignored.
pub fn parse_channel_ids(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().with_context(|| format!("invalid channel id: {s}")))
        .collect()
}
