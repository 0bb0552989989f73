use crate::core::currency::Currency;
use crate::core::error::{FailureCause, RateError};
use crate::core::rate::format_rate;
use crate::core::sink::{RateSink, date_or_today};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ExchangeRatePayload {
    date: String,
    from: String,
    to: String,
    rate: String,
}

#[derive(Debug, Serialize)]
struct ExchangeRatesByDatePayload {
    from: String,
    rates: BTreeMap<String, String>,
}

/// Client for the Firefly III exchange rate endpoints.
pub struct FireflyClient {
    api_url: String,
    api_key: String,
    precision: usize,
    client: reqwest::Client,
}

impl FireflyClient {
    /// `api_url` is the API root, e.g. `https://firefly.example.com/api/v1`.
    pub fn new(api_url: &str, api_key: &str, timeout: Duration, precision: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ffiii-rate-updater/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(FireflyClient {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            precision,
            client,
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        subject: String,
        payload: &T,
    ) -> Result<(), RateError> {
        let submit_error = |subject: String, cause: FailureCause| RateError::Submit {
            subject,
            endpoint: endpoint.to_string(),
            cause,
        };

        debug!("Posting {} to {}", subject, endpoint);
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/vnd.api+json")
            .json(payload)
            .send()
            .await
            .map_err(|e| submit_error(subject.clone(), e.into()))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            status => {
                let body = response.text().await.unwrap_or_default();
                debug!(status = %status, body = %body, "Firefly III rejected exchange rates");
                Err(submit_error(subject, FailureCause::Status(status.as_u16())))
            }
        }
    }
}

#[async_trait]
impl RateSink for FireflyClient {
    async fn send_single(
        &self,
        rate: f64,
        from: &Currency,
        to: &Currency,
        date: &str,
    ) -> Result<(), RateError> {
        let payload = ExchangeRatePayload {
            date: date_or_today(date),
            from: from.upper(),
            to: to.upper(),
            rate: format_rate(rate, self.precision),
        };

        let endpoint = format!("{}/exchange-rates", self.api_url);
        self.post(&endpoint, format!("{from}/{to}"), &payload).await
    }

    async fn send_batch(
        &self,
        from: &Currency,
        rates: &[(Currency, f64)],
        date: &str,
    ) -> Result<(), RateError> {
        let date = date_or_today(date);
        let payload = ExchangeRatesByDatePayload {
            from: from.upper(),
            rates: rates
                .iter()
                .map(|(to, rate)| (to.upper(), format_rate(*rate, self.precision)))
                .collect(),
        };

        let endpoint = format!("{}/exchange-rates/by-date/{}", self.api_url, date);
        self.post(&endpoint, format!("{from} rates"), &payload).await
    }
}
