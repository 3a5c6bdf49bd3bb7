use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Error, bail};
use tracing::{debug, info, instrument};

use crate::asset::AssetDescriptor;
use crate::cache::{CacheKey, CacheTtl, QuoteCache};
use crate::error::ProviderError;
use crate::indicators::rsi::{self, RsiReading, Trend};
use crate::provider::{Interval, MarketData, Quote};

/// Where RSI values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RsiSource {
    /// Compute from closing prices.
    #[default]
    Local,
    /// Use the provider's indicator endpoint.
    Provider,
}

impl FromStr for RsiSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(RsiSource::Local),
            "provider" => Ok(RsiSource::Provider),
            other => bail!("unknown RSI source: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetReport {
    pub asset: &'static AssetDescriptor,
    pub quote: Option<Quote>,
    pub rsi: Vec<(Interval, RsiReading)>,
}

pub struct DigestService {
    provider: Arc<dyn MarketData>,
    cache: QuoteCache,
    ttl: CacheTtl,
    source: RsiSource,
    period: usize,
}

impl DigestService {
    pub fn new(provider: Arc<dyn MarketData>, cache: QuoteCache, ttl: CacheTtl) -> Self {
        Self {
            provider,
            cache,
            ttl,
            source: RsiSource::default(),
            period: rsi::DEFAULT_PERIOD,
        }
    }

    pub fn with_source(mut self, source: RsiSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    /// Build a report for every asset, one after another. The provider
    /// throttle is global, so there is nothing to gain from fan-out.
    #[instrument(name = "digest", skip_all, fields(assets = assets.len()))]
    pub async fn reports(&self, assets: &[&'static AssetDescriptor]) -> Vec<AssetReport> {
        let mut reports = Vec::with_capacity(assets.len());
        for &asset in assets {
            reports.push(self.report(asset).await);
        }

        let degraded = reports.iter().filter(|r| r.is_incomplete()).count();
        info!(total = reports.len(), degraded, "digest assembled");
        reports
    }

    #[instrument(skip_all, fields(symbol = %asset.symbol))]
    pub async fn report(&self, asset: &'static AssetDescriptor) -> AssetReport {
        let quote = self
            .cache
            .fetch_with_cache(&CacheKey::price(asset.symbol), self.ttl.price, || {
                self.provider.quote(asset.symbol)
            })
            .await
            .into_value();

        let mut readings = Vec::with_capacity(Interval::ALL.len());
        for interval in Interval::ALL {
            let key = CacheKey::rsi(interval.as_str(), asset.symbol);
            let reading = self
                .cache
                .fetch_with_cache(&key, self.ttl.rsi, || self.fetch_reading(asset.symbol, interval))
                .await
                .into_value()
                .unwrap_or_default();

            debug!(interval = interval.as_str(), ?reading, "rsi reading");
            readings.push((interval, reading));
        }

        AssetReport {
            asset,
            quote,
            rsi: readings,
        }
    }

    async fn fetch_reading(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<RsiReading, ProviderError> {
        let (reading, got) = match self.source {
            RsiSource::Local => {
                // two overlapping windows of period + 1 closes
                let closes = self.provider.closes(symbol, interval, self.period + 2).await?;
                (rsi::rsi_reading(&closes, self.period), closes.len())
            }
            RsiSource::Provider => {
                let series = self
                    .provider
                    .rsi_series(symbol, interval, self.period, 2)
                    .await?;
                (rsi::reading_from_series(&series), series.len())
            }
        };

        if reading.current.is_none() {
            let needed = match self.source {
                RsiSource::Local => self.period + 1,
                RsiSource::Provider => 1,
            };
            return Err(ProviderError::InsufficientData { needed, got });
        }

        Ok(reading)
    }
}

const NOT_AVAILABLE: &str = "N/A";

fn trend_marker(trend: Trend) -> &'static str {
    match trend {
        Trend::Up => "▲",
        Trend::Down => "▼",
        Trend::Neutral => "•",
    }
}

fn zone(value: f64) -> Option<&'static str> {
    if value >= 70.0 {
        Some("overbought")
    } else if value <= 30.0 {
        Some("oversold")
    } else {
        None
    }
}

impl AssetReport {
    /// True when any metric fell back to `N/A`.
    pub fn is_incomplete(&self) -> bool {
        self.quote.is_none() || self.rsi.iter().any(|(_, r)| r.current.is_none())
    }

    pub fn title(&self) -> String {
        format!("{} ({})", self.asset.display_name, self.asset.symbol)
    }

    pub fn body(&self) -> String {
        let mut out = String::new();

        match self.quote {
            Some(q) => {
                let _ = write!(out, "Price: {}{:.2}", self.asset.currency_symbol, q.price);
                if let Some(pct) = q.change_percent {
                    let trend = if pct > 0.0 {
                        Trend::Up
                    } else if pct < 0.0 {
                        Trend::Down
                    } else {
                        Trend::Neutral
                    };
                    let _ = write!(out, " {} {:+.2}%", trend_marker(trend), pct);
                }
            }
            None => {
                let _ = write!(out, "Price: {} {}", NOT_AVAILABLE, trend_marker(Trend::Neutral));
            }
        }

        for (interval, reading) in &self.rsi {
            let marker = trend_marker(reading.trend());
            let _ = write!(out, "\nRSI {}: ", interval.label());
            match reading.current {
                Some(cur) => {
                    let _ = write!(out, "{cur:.2} {marker}");
                    if let Some(prev) = reading.previous {
                        let _ = write!(out, " (prev {prev:.2})");
                    }
                    if let Some(z) = zone(cur) {
                        let _ = write!(out, " {z}");
                    }
                }
                None => {
                    let _ = write!(out, "{NOT_AVAILABLE} {marker}");
                }
            }
        }

        out
    }

    pub fn render(&self) -> String {
        format!("**{}**\n{}", self.title(), self.body())
    }
}

pub fn render_all(reports: &[AssetReport]) -> String {
    reports
        .iter()
        .map(AssetReport::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}
