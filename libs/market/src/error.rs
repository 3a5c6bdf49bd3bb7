use reqwest::StatusCode;
use thiserror::Error;

/// Reasons a market-data lookup can fail.
///
/// None of these reach the end user: the cache gateway turns them into a
/// stale value or an absent one, and keeps the reason for logging.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("provider error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("provider returned HTTP {0}")]
    Http(StatusCode),

    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("insufficient data: need {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },
}

impl ProviderError {
    /// Quota errors clear on their own once the provider window rolls over.
    pub fn is_quota(&self) -> bool {
        matches!(self, ProviderError::QuotaExceeded(_))
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Malformed(e.to_string())
    }
}
