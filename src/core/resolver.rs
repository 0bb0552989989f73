use crate::core::currency::{Currency, Pair};
use crate::core::error::RateError;
use crate::core::feed::RateFeed;
use crate::core::rate::{Rate, RateTable};
use tracing::{debug, info, warn};

/// Builds a [`RateTable`] by fetching each distinct base currency once.
pub struct RateResolver<'a> {
    feed: &'a dyn RateFeed,
}

impl<'a> RateResolver<'a> {
    pub fn new(feed: &'a dyn RateFeed) -> Self {
        RateResolver { feed }
    }

    /// Fetches in the order currencies first appear. Any failure aborts the build.
    pub async fn build(&self, currencies: &[Currency], date: &str) -> Result<RateTable, RateError> {
        let mut rates = Vec::new();

        for base in distinct(currencies) {
            info!("Fetching rates for {} on {}", base, date);
            let response = self.feed.fetch_rates(base, date).await?;
            debug!(
                base = %base,
                date = %response.date,
                count = response.rates.len(),
                "Received feed rates"
            );

            for (to, value) in response.rates {
                if !value.is_finite() || value <= 0.0 {
                    warn!(base = %base, code = %to, value, "Dropping non-positive rate from feed");
                    continue;
                }
                rates.push(Rate {
                    date: response.date.clone(),
                    pair: Pair::new(base.clone(), to),
                    value,
                });
            }
        }

        Ok(RateTable::new(rates))
    }
}

/// Keeps the first occurrence of each currency, compared case-insensitively.
pub fn distinct(currencies: &[Currency]) -> Vec<&Currency> {
    let mut seen: Vec<&Currency> = Vec::with_capacity(currencies.len());
    for c in currencies {
        if !seen.contains(&c) {
            seen.push(c);
        }
    }
    seen
}
