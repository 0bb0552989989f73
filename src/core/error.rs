//! Error types shared by the feed, the resolver, the submission client and the pipeline

use crate::core::currency::Currency;
use thiserror::Error;

/// Why an HTTP exchange failed.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// The part of a feed response that could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("missing 'date' field")]
    MissingDate,
    #[error("'date' field is not a string")]
    DateNotString,
    #[error("missing '{0}' field")]
    MissingBase(String),
    #[error("'{0}' field is not an object")]
    BaseNotObject(String),
    #[error("rate for '{code}' is not a number")]
    NonNumericRate { code: String },
}

#[derive(Debug, Error)]
pub enum RateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to fetch {base} rates from {url}: {cause}")]
    Fetch {
        base: Currency,
        url: String,
        #[source]
        cause: FailureCause,
    },

    #[error("malformed rate feed response for {base}: {kind}")]
    Parse { base: Currency, kind: ParseErrorKind },

    #[error("rate not found for pair {from}/{to}")]
    NotFound { from: Currency, to: Currency },

    #[error("failed to submit {subject} to {endpoint}: {cause}")]
    Submit {
        subject: String,
        endpoint: String,
        #[source]
        cause: FailureCause,
    },
}

impl RateError {
    pub fn config(message: impl Into<String>) -> Self {
        RateError::Config(message.into())
    }

    /// Fatal errors abort the whole run; the rest only skip one unit of work.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RateError::Config(_) | RateError::Fetch { .. } | RateError::Parse { .. }
        )
    }
}
