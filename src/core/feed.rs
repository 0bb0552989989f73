//! Rate feed abstraction

use crate::core::currency::Currency;
use crate::core::error::RateError;
use async_trait::async_trait;

/// Date sentinel understood by the feed as "most recent publication".
pub const LATEST: &str = "latest";

/// Rates published by the feed for one base currency.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRates {
    /// The date the feed actually used, which may differ from the requested one.
    pub date: String,
    pub rates: Vec<(Currency, f64)>,
}

#[async_trait]
pub trait RateFeed: Send + Sync {
    /// Fetches rates from `base` to every other currency the feed knows on `date`.
    async fn fetch_rates(&self, base: &Currency, date: &str) -> Result<FeedRates, RateError>;
}
