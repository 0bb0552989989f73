//! Rate resolution and submission pipeline

pub mod config;
pub mod currency;
pub mod error;
pub mod feed;
pub mod log;
pub mod pipeline;
pub mod rate;
pub mod resolver;
pub mod sink;

// Re-export main types for cleaner imports
pub use currency::{Currency, Pair};
pub use error::{FailureCause, ParseErrorKind, RateError};
pub use feed::{FeedRates, RateFeed};
pub use pipeline::{Pipeline, RunReport, RunState, Stage, SubmitMode, UnitOutcome, UnitStatus};
pub use rate::{Rate, RateTable};
pub use sink::RateSink;
