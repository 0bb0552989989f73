//! Destination for resolved exchange rates

use crate::core::currency::Currency;
use crate::core::error::RateError;
use async_trait::async_trait;

#[async_trait]
pub trait RateSink: Send + Sync {
    /// Stores a single `from -> to` rate. An empty `date` means today.
    async fn send_single(
        &self,
        rate: f64,
        from: &Currency,
        to: &Currency,
        date: &str,
    ) -> Result<(), RateError>;

    /// Stores all rates from one base currency for a date. An empty `date` means today.
    async fn send_batch(
        &self,
        from: &Currency,
        rates: &[(Currency, f64)],
        date: &str,
    ) -> Result<(), RateError>;
}

pub(crate) fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

pub(crate) fn date_or_today(date: &str) -> String {
    if date.is_empty() {
        today()
    } else {
        date.to_string()
    }
}
