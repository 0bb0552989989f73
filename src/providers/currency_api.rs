use crate::core::currency::Currency;
use crate::core::error::{FailureCause, ParseErrorKind, RateError};
use crate::core::feed::{FeedRates, LATEST, RateFeed};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// jsDelivr mirror of the fawazahmed0 currency-api.
pub const DEFAULT_SOURCE: &str =
    "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@{date}/v1/{endpoint}/{currency}.min.json";
/// Cloudflare Pages mirror of the same data, usable as a second source.
pub const FALLBACK_SOURCE: &str = "https://{date}.currency-api.pages.dev/v1/{endpoint}/{currency}.min.json";
pub const DEFAULT_ENDPOINT: &str = "currencies";

/// Rate feed backed by the currency-api JSON files.
///
/// `sources` are URL templates with `{date}`, `{endpoint}` and `{currency}` placeholders.
/// They are tried in order until one returns a usable response.
pub struct CurrencyApiFeed {
    sources: Vec<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl CurrencyApiFeed {
    pub fn new(sources: &[String], endpoint: &str, timeout: Duration) -> Result<Self> {
        if sources.is_empty() {
            return Err(anyhow!("At least one rate feed source is required"));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("ffiii-rate-updater/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(CurrencyApiFeed {
            sources: sources.to_vec(),
            endpoint: endpoint.to_string(),
            client,
        })
    }

    fn url(&self, template: &str, date: &str, base: &Currency) -> String {
        template
            .replace("{date}", date)
            .replace("{endpoint}", &self.endpoint)
            .replace("{currency}", &base.lower())
    }

    async fn fetch_from(&self, url: &str, base: &Currency) -> Result<FeedRates, RateError> {
        let fetch_error = |cause: FailureCause| RateError::Fetch {
            base: base.clone(),
            url: url.to_string(),
            cause,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(FailureCause::Status(status.as_u16())));
        }

        let body = response.text().await.map_err(|e| fetch_error(e.into()))?;
        parse_response(base, &body)
    }
}

#[async_trait]
impl RateFeed for CurrencyApiFeed {
    #[instrument(name = "FeedFetch", skip(self), fields(base = %base))]
    async fn fetch_rates(&self, base: &Currency, date: &str) -> Result<FeedRates, RateError> {
        let date = if date.is_empty() { LATEST } else { date };

        let mut last_error = None;
        for (i, template) in self.sources.iter().enumerate() {
            let url = self.url(template, date, base);
            debug!("Requesting rates from {}", url);

            match self.fetch_from(&url, base).await {
                Ok(rates) => return Ok(rates),
                Err(e) => {
                    if i + 1 < self.sources.len() {
                        warn!("Rate source {} failed, trying next one: {}", i + 1, e);
                    }
                    last_error = Some(e);
                }
            }
        }

        // `new` guarantees at least one source
        Err(last_error.unwrap_or_else(|| RateError::config("no rate feed sources configured")))
    }
}

/// Decodes `{"date": "...", "<base>": {"<code>": <rate>, ...}}`.
pub fn parse_response(base: &Currency, body: &str) -> Result<FeedRates, RateError> {
    let parse_error = |kind: ParseErrorKind| RateError::Parse {
        base: base.clone(),
        kind,
    };

    let json: Value =
        serde_json::from_str(body).map_err(|e| parse_error(ParseErrorKind::InvalidJson(e.to_string())))?;
    let object = json
        .as_object()
        .ok_or_else(|| parse_error(ParseErrorKind::NotAnObject))?;

    let date = object
        .get("date")
        .ok_or_else(|| parse_error(ParseErrorKind::MissingDate))?
        .as_str()
        .ok_or_else(|| parse_error(ParseErrorKind::DateNotString))?
        .to_string();

    let key = base.lower();
    let rates_map = object
        .get(&key)
        .ok_or_else(|| parse_error(ParseErrorKind::MissingBase(key.clone())))?
        .as_object()
        .ok_or_else(|| parse_error(ParseErrorKind::BaseNotObject(key.clone())))?;

    let rates = rates_map
        .iter()
        .map(|(code, value)| {
            value
                .as_f64()
                .map(|v| (Currency::new(code.as_str()), v))
                .ok_or_else(|| parse_error(ParseErrorKind::NonNumericRate { code: code.clone() }))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FeedRates { date, rates })
}
