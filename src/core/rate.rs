//! Resolved exchange rates and the per-run rate table

use crate::core::currency::{Currency, Pair};
use crate::core::error::RateError;
use std::fmt::Display;

/// Decimal places used when a rate is sent to Firefly III.
pub const DEFAULT_RATE_PRECISION: usize = 8;

/// Formats a rate as fixed-point text, rounding at `precision` decimals.
pub fn format_rate(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

/// 1 unit of `pair.from` is worth `value` units of `pair.to` on `date`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rate {
    pub date: String,
    pub pair: Pair,
    pub value: f64,
}

impl Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:.6} on {}", self.pair, self.value, self.date)
    }
}

/// All rates resolved for one run. Built once, then only read.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: Vec<Rate>,
}

impl RateTable {
    pub fn new(rates: Vec<Rate>) -> Self {
        RateTable { rates }
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Returns the first rate for `from -> to`.
    pub fn lookup(&self, from: &Currency, to: &Currency) -> Result<&Rate, RateError> {
        let not_found = || RateError::NotFound {
            from: from.clone(),
            to: to.clone(),
        };
        if from.is_empty() || to.is_empty() {
            return Err(not_found());
        }

        self.rates
            .iter()
            .find(|r| r.pair.from == *from && r.pair.to == *to)
            .ok_or_else(not_found)
    }
}
