use crate::core::currency::Currency;
use crate::core::error::RateError;
use crate::core::feed::LATEST;
use crate::core::pipeline::SubmitMode;
use crate::core::rate::DEFAULT_RATE_PRECISION;
use crate::core::resolver::distinct;
use crate::providers::currency_api::{DEFAULT_ENDPOINT, DEFAULT_SOURCE};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const ENV_PREFIX: &str = "FFIII_RATE_UPDATER_";
const MIN_RATE_PRECISION: usize = 6;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FireflyConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default = "default_firefly_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_precision")]
    pub precision: usize,
}

impl Default for FireflyConfig {
    fn default() -> Self {
        FireflyConfig {
            api_key: String::new(),
            api_url: String::new(),
            timeout_secs: default_firefly_timeout(),
            precision: default_precision(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    /// URL templates tried in order; see `CurrencyApiFeed`.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            sources: default_sources(),
            endpoint: default_endpoint(),
            timeout_secs: default_feed_timeout(),
        }
    }
}

fn default_firefly_timeout() -> u64 {
    10
}

fn default_feed_timeout() -> u64 {
    30
}

fn default_precision() -> usize {
    DEFAULT_RATE_PRECISION
}

fn default_sources() -> Vec<String> {
    vec![DEFAULT_SOURCE.to_string()]
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_date() -> String {
    LATEST.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub firefly: FireflyConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub currencies: Vec<Currency>,
    #[serde(default = "default_date")]
    pub date: String,
    #[serde(default)]
    pub mode: SubmitMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            firefly: FireflyConfig::default(),
            feed: FeedConfig::default(),
            currencies: Vec::new(),
            date: default_date(),
            mode: SubmitMode::default(),
        }
    }
}

/// Values given on the command line. They win over the file and the environment.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub currencies: Option<Vec<String>>,
    pub date: Option<String>,
    pub mode: Option<SubmitMode>,
}

/// Validated settings for one update run.
#[derive(Debug, Clone)]
pub struct UpdateSettings {
    pub api_key: String,
    pub api_url: String,
    pub firefly_timeout: Duration,
    pub precision: usize,
    pub feed_sources: Vec<String>,
    pub feed_endpoint: String,
    pub feed_timeout: Duration,
    pub currencies: Vec<Currency>,
    pub date: String,
    pub mode: SubmitMode,
}

impl AppConfig {
    /// Reads `./config.yaml`, then the per-user config file. No file at all yields defaults.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let local = PathBuf::from("config.yaml");
        if local.exists() {
            return Self::load_from_path(&local);
        }

        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "ffiii-rate-updater")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Applies `FFIII_RATE_UPDATER_*` variables using `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());

        if let Some(key) = var("API_KEY") {
            self.firefly.api_key = key;
        }
        if let Some(url) = var("API_URL") {
            self.firefly.api_url = url;
        }
        if let Some(list) = var("CURRENCIES") {
            self.currencies = split_currencies(&list);
        }
        if let Some(date) = var("DATE") {
            self.date = date;
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(key) = &overrides.api_key {
            self.firefly.api_key = key.clone();
        }
        if let Some(url) = &overrides.api_url {
            self.firefly.api_url = url.clone();
        }
        if let Some(list) = &overrides.currencies {
            self.currencies = list
                .iter()
                .flat_map(|c| split_currencies(c))
                .collect();
        }
        if let Some(date) = &overrides.date {
            self.date = date.clone();
        }
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
    }

    /// Checks everything an update run needs before any request is made.
    pub fn into_settings(self) -> Result<UpdateSettings, RateError> {
        let firefly = self.firefly;

        if firefly.api_key.trim().is_empty() {
            return Err(RateError::config("Firefly III API key is not set"));
        }
        let api_url = firefly.api_url.trim().to_string();
        if api_url.is_empty() {
            return Err(RateError::config("Firefly III API URL is not set"));
        }
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(RateError::config(format!(
                "Firefly III API URL must start with http:// or https://: {api_url}"
            )));
        }

        let currencies: Vec<Currency> = self
            .currencies
            .iter()
            .map(|c| Currency::new(c.code().trim()))
            .collect();
        if currencies.iter().any(Currency::is_empty) {
            return Err(RateError::config("currency codes cannot be empty"));
        }
        if distinct(&currencies).len() < 2 {
            return Err(RateError::config(
                "please provide at least two currencies to fetch exchange rates",
            ));
        }

        let date = match self.date.trim() {
            "" => LATEST.to_string(),
            d if d.eq_ignore_ascii_case(LATEST) => LATEST.to_string(),
            d => chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map(|parsed| parsed.format("%Y-%m-%d").to_string())
                .map_err(|_| {
                    RateError::config(format!("date must be 'latest' or YYYY-MM-DD, got '{d}'"))
                })?,
        };

        let feed = self.feed;
        if feed.sources.is_empty() {
            return Err(RateError::config("at least one rate feed source is required"));
        }
        if let Some(bad) = feed.sources.iter().find(|s| !s.contains("{currency}")) {
            return Err(RateError::config(format!(
                "rate feed source must contain a {{currency}} placeholder: {bad}"
            )));
        }
        if firefly.precision < MIN_RATE_PRECISION {
            return Err(RateError::config(format!(
                "rate precision must be at least {MIN_RATE_PRECISION} decimals"
            )));
        }
        if firefly.timeout_secs == 0 || feed.timeout_secs == 0 {
            return Err(RateError::config("timeouts must be greater than zero"));
        }

        Ok(UpdateSettings {
            api_key: firefly.api_key.trim().to_string(),
            api_url,
            firefly_timeout: Duration::from_secs(firefly.timeout_secs),
            precision: firefly.precision,
            feed_sources: feed.sources,
            feed_endpoint: feed.endpoint,
            feed_timeout: Duration::from_secs(feed.timeout_secs),
            currencies,
            date,
            mode: self.mode,
        })
    }
}

fn split_currencies(list: &str) -> Vec<Currency> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(Currency::from)
        .collect()
}
