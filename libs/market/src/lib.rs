mod error;
mod throttle;

pub mod asset;
pub mod cache;
pub mod clock;
pub mod digest;
pub mod indicators;
pub mod provider;

pub use asset::{AssetDescriptor, Selection};
pub use digest::{AssetReport, DigestService, RsiSource};
pub use error::ProviderError;
pub use provider::{Interval, MarketData, MarketDataClient, Quote};
pub use throttle::Throttle;
