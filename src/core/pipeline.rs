//! Drives a single update run: validate, resolve every rate, then submit.
//!
//! Resolution is all-or-nothing. Submission is done unit by unit, where a unit is one
//! currency pair (pair mode) or one base currency (batch mode), and a failing unit is
//! logged and recorded without affecting the others.

use crate::core::currency::{Currency, Pair};
use crate::core::error::RateError;
use crate::core::feed::RateFeed;
use crate::core::rate::RateTable;
use crate::core::resolver::{RateResolver, distinct};
use crate::core::sink::RateSink;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    /// One request per base currency carrying the rates to all other currencies.
    #[default]
    Batch,
    /// One request per ordered currency pair.
    Pairs,
}

impl Display for SubmitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitMode::Batch => write!(f, "batch"),
            SubmitMode::Pairs => write!(f, "pairs"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    RatesResolved,
    Submitting,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Submit,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Resolve => write!(f, "resolve"),
            Stage::Submit => write!(f, "submit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitStatus {
    Sent { rates: usize, date: String },
    Skipped { stage: Stage, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitOutcome {
    /// `USD/EUR` in pair mode, `USD` in batch mode.
    pub label: String,
    pub status: UnitStatus,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: SubmitMode,
    pub state: RunState,
    pub outcomes: Vec<UnitOutcome>,
}

impl RunReport {
    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, UnitStatus::Sent { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.sent()
    }
}

pub struct Pipeline<'a> {
    feed: &'a dyn RateFeed,
    sink: &'a dyn RateSink,
    state: RunState,
}

impl<'a> Pipeline<'a> {
    pub fn new(feed: &'a dyn RateFeed, sink: &'a dyn RateSink) -> Self {
        Pipeline {
            feed,
            sink,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "Pipeline state change");
        self.state = next;
    }

    /// Number of units `run` will attempt for the given currencies.
    pub fn unit_count(currencies: &[Currency], mode: SubmitMode) -> usize {
        let n = distinct(currencies).len();
        match mode {
            SubmitMode::Batch => n,
            SubmitMode::Pairs => n * n.saturating_sub(1),
        }
    }

    /// Runs the update. Only configuration and rate resolution errors are returned;
    /// per-unit failures end up in the report.
    pub async fn run(
        &mut self,
        currencies: &[Currency],
        date: &str,
        mode: SubmitMode,
        on_unit_done: &(dyn Fn(&UnitOutcome) + Sync),
    ) -> Result<RunReport, RateError> {
        self.transition(RunState::Idle);
        let currencies: Vec<Currency> = distinct(currencies).into_iter().cloned().collect();
        if currencies.iter().any(Currency::is_empty) {
            return Err(RateError::config("currency codes cannot be empty"));
        }
        if currencies.len() < 2 {
            return Err(RateError::config(
                "please provide at least two currencies to fetch exchange rates",
            ));
        }

        let table = RateResolver::new(self.feed).build(&currencies, date).await?;
        if table.is_empty() {
            warn!("Rate feed returned no usable rates");
        }
        info!("Resolved {} rates for {} currencies", table.len(), currencies.len());
        self.transition(RunState::RatesResolved);

        self.transition(RunState::Submitting);
        let outcomes = match mode {
            SubmitMode::Pairs => self.submit_pairs(&table, &currencies, on_unit_done).await,
            SubmitMode::Batch => self.submit_batches(&table, &currencies, on_unit_done).await,
        };
        self.transition(RunState::Done);

        let report = RunReport {
            mode,
            state: self.state,
            outcomes,
        };
        info!(
            sent = report.sent(),
            skipped = report.skipped(),
            "Exchange rate update finished"
        );
        Ok(report)
    }

    async fn submit_pairs(
        &self,
        table: &RateTable,
        currencies: &[Currency],
        on_unit_done: &(dyn Fn(&UnitOutcome) + Sync),
    ) -> Vec<UnitOutcome> {
        let mut outcomes = Vec::new();

        for from in currencies {
            for to in currencies.iter().filter(|to| *to != from) {
                let pair = Pair::new(from.clone(), to.clone());
                let status = match table.lookup(from, to) {
                    Err(e) => skipped(&pair, Stage::Resolve, e),
                    Ok(rate) => {
                        let sent = self
                            .sink
                            .send_single(rate.value, from, to, &rate.date)
                            .await;
                        match sent {
                            Ok(()) => {
                                info!("Sent exchange rate {}", rate);
                                UnitStatus::Sent {
                                    rates: 1,
                                    date: rate.date.clone(),
                                }
                            }
                            Err(e) => skipped(&pair, Stage::Submit, e),
                        }
                    }
                };

                let outcome = UnitOutcome {
                    label: pair.to_string(),
                    status,
                };
                on_unit_done(&outcome);
                outcomes.push(outcome);
            }
        }

        outcomes
    }

    async fn submit_batches(
        &self,
        table: &RateTable,
        currencies: &[Currency],
        on_unit_done: &(dyn Fn(&UnitOutcome) + Sync),
    ) -> Vec<UnitOutcome> {
        let mut outcomes = Vec::new();

        for base in currencies {
            let mut date = String::new();
            let mut batch = Vec::new();
            for to in currencies.iter().filter(|to| *to != base) {
                match table.lookup(base, to) {
                    Ok(rate) => {
                        if date.is_empty() {
                            date = rate.date.clone();
                        }
                        batch.push((to.clone(), rate.value));
                    }
                    Err(e) => {
                        warn!(base = %base, stage = %Stage::Resolve, "{e}, leaving it out of the batch");
                    }
                }
            }

            let status = if batch.is_empty() {
                let reason = format!("no rates from {base} to the other configured currencies");
                warn!(base = %base, stage = %Stage::Resolve, "Skipping batch: {reason}");
                UnitStatus::Skipped {
                    stage: Stage::Resolve,
                    reason,
                }
            } else {
                // A failed base is recorded and the remaining bases are still sent
                let sent = self.sink.send_batch(base, &batch, &date).await;
                match sent {
                    Ok(()) => {
                        info!("Sent {} exchange rates for {} on {}", batch.len(), base, date);
                        UnitStatus::Sent {
                            rates: batch.len(),
                            date,
                        }
                    }
                    Err(e) => {
                        warn!(base = %base, stage = %Stage::Submit, "Error sending rates: {e}");
                        UnitStatus::Skipped {
                            stage: Stage::Submit,
                            reason: e.to_string(),
                        }
                    }
                }
            };

            let outcome = UnitOutcome {
                label: base.to_string(),
                status,
            };
            on_unit_done(&outcome);
            outcomes.push(outcome);
        }

        outcomes
    }
}

fn skipped(pair: &Pair, stage: Stage, error: RateError) -> UnitStatus {
    warn!(pair = %pair, stage = %stage, "Error processing rate: {error}");
    UnitStatus::Skipped {
        stage,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FailureCause;
    use crate::core::resolver::tests::FakeFeed;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Single {
            from: String,
            to: String,
            rate: f64,
            date: String,
        },
        Batch {
            from: String,
            targets: Vec<String>,
            date: String,
        },
    }

    /// Records every submission and fails for the listed labels (`USD/EUR` or `USD`).
    #[derive(Default)]
    struct RecordingSink {
        failing: Vec<String>,
        sent: Mutex<Vec<Sent>>,
    }

    impl RecordingSink {
        fn failing_for(label: &str) -> Self {
            RecordingSink {
                failing: vec![label.to_string()],
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn check(&self, label: String) -> Result<(), RateError> {
            if self.failing.contains(&label) {
                return Err(RateError::Submit {
                    subject: label,
                    endpoint: "fake://firefly".to_string(),
                    cause: FailureCause::Status(500),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RateSink for RecordingSink {
        async fn send_single(
            &self,
            rate: f64,
            from: &Currency,
            to: &Currency,
            date: &str,
        ) -> Result<(), RateError> {
            self.sent.lock().unwrap().push(Sent::Single {
                from: from.upper(),
                to: to.upper(),
                rate,
                date: date.to_string(),
            });
            self.check(format!("{from}/{to}"))
        }

        async fn send_batch(
            &self,
            from: &Currency,
            rates: &[(Currency, f64)],
            date: &str,
        ) -> Result<(), RateError> {
            self.sent.lock().unwrap().push(Sent::Batch {
                from: from.upper(),
                targets: rates.iter().map(|(c, _)| c.upper()).collect(),
                date: date.to_string(),
            });
            self.check(from.to_string())
        }
    }

    fn three_currency_feed() -> FakeFeed {
        FakeFeed::default()
            .with("usd", "2025-01-01", &[("eur", 0.9), ("gbp", 0.8), ("jpy", 150.0)])
            .with("eur", "2025-01-01", &[("usd", 1.1), ("gbp", 0.85)])
            .with("gbp", "2025-01-01", &[("usd", 1.25), ("eur", 1.18)])
    }

    fn currencies(codes: &[&str]) -> Vec<Currency> {
        codes.iter().map(|c| Currency::new(*c)).collect()
    }

    fn no_progress(_: &UnitOutcome) {}

    #[tokio::test]
    async fn test_pairs_mode_sends_every_permutation() {
        let feed = three_currency_feed();
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(&feed, &sink);

        let report = pipeline
            .run(&currencies(&["usd", "eur", "gbp"]), "latest", SubmitMode::Pairs, &no_progress)
            .await
            .unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 3 * 2);
        assert_eq!(
            sent[0],
            Sent::Single {
                from: "USD".to_string(),
                to: "EUR".to_string(),
                rate: 0.9,
                date: "2025-01-01".to_string(),
            }
        );
        assert_eq!(report.sent(), 6);
        assert_eq!(report.state, RunState::Done);
        assert_eq!(pipeline.state(), RunState::Done);
    }

    #[tokio::test]
    async fn test_batch_mode_sends_once_per_base() {
        let feed = three_currency_feed();
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(&feed, &sink);

        let report = pipeline
            .run(&currencies(&["usd", "eur", "gbp"]), "latest", SubmitMode::Batch, &no_progress)
            .await
            .unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 3);
        // JPY is in the feed but not configured, so it is not sent
        assert_eq!(
            sent[0],
            Sent::Batch {
                from: "USD".to_string(),
                targets: vec!["EUR".to_string(), "GBP".to_string()],
                date: "2025-01-01".to_string(),
            }
        );
        for s in &sent {
            if let Sent::Batch { targets, .. } = s {
                assert_eq!(targets.len(), 2);
            }
        }
        assert_eq!(report.sent(), 3);
        assert_eq!(report.state, RunState::Done);
    }

    #[tokio::test]
    async fn test_pair_submission_failure_does_not_stop_run() {
        let feed = three_currency_feed();
        let sink = RecordingSink::failing_for("USD/EUR");
        let mut pipeline = Pipeline::new(&feed, &sink);

        let report = pipeline
            .run(&currencies(&["usd", "eur", "gbp"]), "latest", SubmitMode::Pairs, &no_progress)
            .await
            .unwrap();

        assert_eq!(sink.sent().len(), 6);
        assert_eq!(report.sent(), 5);
        assert_eq!(report.skipped(), 1);
        assert!(matches!(
            report.outcomes[0].status,
            UnitStatus::Skipped {
                stage: Stage::Submit,
                ..
            }
        ));
        assert_eq!(report.state, RunState::Done);
    }

    #[tokio::test]
    async fn test_missing_pair_is_skipped() {
        let feed = FakeFeed::default()
            .with("usd", "2025-01-01", &[("eur", 0.9)])
            .with("eur", "2025-01-01", &[("gbp", 0.85)]);
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(&feed, &sink);

        let report = pipeline
            .run(&currencies(&["usd", "eur"]), "latest", SubmitMode::Pairs, &no_progress)
            .await
            .unwrap();

        assert_eq!(sink.sent().len(), 1);
        assert_eq!(report.outcomes[1].label, "EUR/USD");
        assert!(matches!(
            report.outcomes[1].status,
            UnitStatus::Skipped {
                stage: Stage::Resolve,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_batch_failure_continues_with_remaining_bases() {
        let feed = three_currency_feed();
        let sink = RecordingSink::failing_for("USD");
        let mut pipeline = Pipeline::new(&feed, &sink);

        let report = pipeline
            .run(&currencies(&["usd", "eur", "gbp"]), "latest", SubmitMode::Batch, &no_progress)
            .await
            .unwrap();

        assert_eq!(sink.sent().len(), 3);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.sent(), 2);
        assert_eq!(report.outcomes[0].label, "USD");
        assert_eq!(report.state, RunState::Done);
    }

    #[tokio::test]
    async fn test_batch_without_targets_is_skipped() {
        let feed = FakeFeed::default()
            .with("usd", "2025-01-01", &[("eur", 0.9)])
            .with("eur", "2025-01-01", &[("jpy", 160.0)]);
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(&feed, &sink);

        let report = pipeline
            .run(&currencies(&["usd", "eur"]), "latest", SubmitMode::Batch, &no_progress)
            .await
            .unwrap();

        assert_eq!(sink.sent().len(), 1);
        assert_eq!(
            report.outcomes[1].status,
            UnitStatus::Skipped {
                stage: Stage::Resolve,
                reason: "no rates from EUR to the other configured currencies".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_before_submitting() {
        let feed = three_currency_feed().failing_for("gbp");
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(&feed, &sink);

        let result = pipeline
            .run(&currencies(&["usd", "eur", "gbp"]), "latest", SubmitMode::Pairs, &no_progress)
            .await;

        assert!(matches!(result, Err(RateError::Fetch { .. })));
        assert!(sink.sent().is_empty());
        assert_eq!(pipeline.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_reused_pipeline_starts_from_idle() {
        let feed = three_currency_feed().failing_for("gbp");
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(&feed, &sink);

        pipeline
            .run(&currencies(&["usd", "eur"]), "latest", SubmitMode::Batch, &no_progress)
            .await
            .unwrap();
        assert_eq!(pipeline.state(), RunState::Done);

        let result = pipeline
            .run(&currencies(&["usd", "gbp"]), "latest", SubmitMode::Batch, &no_progress)
            .await;
        assert!(result.is_err());
        assert_eq!(pipeline.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_too_few_currencies_is_config_error() {
        let feed = three_currency_feed();
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(&feed, &sink);

        for codes in [&[][..], &["usd"][..], &["usd", "USD"][..]] {
            let result = pipeline
                .run(&currencies(codes), "latest", SubmitMode::Batch, &no_progress)
                .await;
            assert!(matches!(result, Err(RateError::Config(_))));
        }

        assert!(feed.calls().is_empty());
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_progress_called_per_unit() {
        let feed = three_currency_feed();
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(&feed, &sink);
        let count = AtomicUsize::new(0);
        let list = currencies(&["usd", "eur", "gbp"]);

        pipeline
            .run(&list, "latest", SubmitMode::Pairs, &|_: &UnitOutcome| {
                count.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 6);
        assert_eq!(Pipeline::unit_count(&list, SubmitMode::Pairs), 6);
        assert_eq!(Pipeline::unit_count(&list, SubmitMode::Batch), 3);
    }
}
