//! Currency codes and directed currency pairs

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::hash::{Hash, Hasher};

/// A currency code such as `USD`.
///
/// The code is stored as given, but comparisons and hashing ignore case so that
/// `usd` from the rate feed and `USD` from the configuration are the same currency.
/// An empty code stands for "no currency" and never equals a real one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Currency(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Form used by the destination API and for display.
    pub fn upper(&self) -> String {
        self.0.to_uppercase()
    }

    /// Form used by the rate feed for URLs and JSON keys.
    pub fn lower(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Currency {}

impl Hash for Currency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.upper())
    }
}

impl From<String> for Currency {
    fn from(code: String) -> Self {
        Currency(code)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Currency(code.to_string())
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

/// A one-directional conversion from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair {
    pub from: Currency,
    pub to: Currency,
}

impl Pair {
    pub fn new(from: Currency, to: Currency) -> Self {
        Pair { from, to }
    }
}

impl Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}
