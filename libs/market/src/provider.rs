use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;

/// Spot price lookup for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub change_percent: Option<f64>,
}

/// What the digest needs from a market-data provider.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote, ProviderError>;

    /// Closing prices, oldest first.
    async fn closes(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<f64>, ProviderError>;

    /// RSI series computed by the provider, oldest first.
    async fn rsi_series(
        &self,
        symbol: &str,
        interval: Interval,
        period: usize,
        count: usize,
    ) -> Result<Vec<f64>, ProviderError>;
}

#[derive(Clone)]
pub struct MarketDataClient {
    client: Client,
    base_api: String,
    api_key: String,
}

impl MarketDataClient {
    pub fn new(base_api: String, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_api,
            api_key,
        })
    }

    pub fn from_env() -> Result<Self> {
        let base_api = std::env::var("MARKET_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.twelvedata.com".to_string());
        let api_key = std::env::var("MARKET_API_KEY")?;
        Self::new(base_api, api_key)
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let url = format!("{}/{}", self.base_api.trim_end_matches('/'), path);

        let res = self
            .client
            .get(url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(ProviderError::Http(status));
        }

        let text = res.text().await?;
        let body: Value = serde_json::from_str(&text)?;
        check_error(&body)?;
        Ok(body)
    }
}

#[async_trait]
impl MarketData for MarketDataClient {
    async fn quote(&self, symbol: &str) -> Result<Quote, ProviderError> {
        let body = self.get("quote", &[("symbol", symbol.to_string())]).await?;
        parse_quote(&body)
    }

    async fn closes(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<f64>, ProviderError> {
        let body = self
            .get(
                "time_series",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.as_str().to_string()),
                    ("outputsize", count.to_string()),
                ],
            )
            .await?;
        parse_series(&body, "close")
    }

    async fn rsi_series(
        &self,
        symbol: &str,
        interval: Interval,
        period: usize,
        count: usize,
    ) -> Result<Vec<f64>, ProviderError> {
        let body = self
            .get(
                "rsi",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.as_str().to_string()),
                    ("time_period", period.to_string()),
                    ("outputsize", count.to_string()),
                ],
            )
            .await?;
        parse_series(&body, "rsi")
    }
}

//
// Provider intervals
// https://twelvedata.com/docs#time-series
//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Day1,
    Week1,
    Month1,
}

impl Interval {
    pub const ALL: [Interval; 3] = [Interval::Day1, Interval::Week1, Interval::Month1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Day1 => "1day",
            Interval::Week1 => "1week",
            Interval::Month1 => "1month",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Interval::Day1 => "Daily",
            Interval::Week1 => "Weekly",
            Interval::Month1 => "Monthly",
        }
    }
}

/// Errors that arrive inside a 200 response.
///
/// The native shape is `{"status":"error","code":429,"message":"..."}`, at
/// times without `status`; some gateways answer with a bare `{"Note": "..."}`
/// or `{"Information": "..."}` quota notice instead.
pub fn check_error(body: &Value) -> Result<(), ProviderError> {
    let Some(obj) = body.as_object() else {
        return Err(ProviderError::Malformed("expected a JSON object".into()));
    };

    for notice in ["Note", "Information"] {
        if let Some(text) = obj.get(notice).and_then(Value::as_str) {
            return Err(ProviderError::QuotaExceeded(text.to_string()));
        }
    }

    let is_error = obj.get("status").and_then(Value::as_str) == Some("error");
    let has_data = obj.contains_key("values") || obj.contains_key("close");
    let bare_error = !has_data
        && obj.get("code").is_some_and(Value::is_i64)
        && obj.get("message").is_some_and(Value::is_string);
    if !is_error && !bare_error {
        return Ok(());
    }

    let code = obj.get("code").and_then(Value::as_i64).unwrap_or_default();
    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown provider error")
        .to_string();

    let lower = message.to_lowercase();
    if code == 429 || lower.contains("credits") || lower.contains("limit") {
        Err(ProviderError::QuotaExceeded(message))
    } else {
        Err(ProviderError::Api { code, message })
    }
}

pub fn parse_quote(body: &Value) -> Result<Quote, ProviderError> {
    let price = body
        .get("close")
        .and_then(number)
        .ok_or_else(|| ProviderError::Malformed("quote without close".into()))?;
    let change_percent = body.get("percent_change").and_then(number);

    Ok(Quote {
        price,
        change_percent,
    })
}

/// Pull `field` out of a `values` array (newest first) into an oldest-first
/// series. Entries that are missing the field or are not numeric are skipped.
pub fn parse_series(body: &Value, field: &str) -> Result<Vec<f64>, ProviderError> {
    let values: Vec<Map<String, Value>> = body
        .get("values")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .ok_or_else(|| ProviderError::Malformed("response without values".into()))?;

    let mut series: Vec<f64> = values
        .iter()
        .filter_map(|point| point.get(field).and_then(number))
        .collect();
    series.reverse();

    Ok(series)
}

fn number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}
