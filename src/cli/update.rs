use super::ui;
use crate::core::config::UpdateSettings;
use crate::core::{Pipeline, RunReport, UnitOutcome};
use crate::providers::{CurrencyApiFeed, FireflyClient};
use anyhow::{Context, Result};
use tracing::info;

/// Fetches the configured rates and sends them to Firefly III.
pub async fn run(settings: &UpdateSettings) -> Result<RunReport> {
    let feed = CurrencyApiFeed::new(
        &settings.feed_sources,
        &settings.feed_endpoint,
        settings.feed_timeout,
    )
    .context("Failed to create rate feed client")?;
    let firefly = FireflyClient::new(
        &settings.api_url,
        &settings.api_key,
        settings.firefly_timeout,
        settings.precision,
    )
    .context("Failed to create Firefly III client")?;

    info!(
        currencies = ?settings.currencies.iter().map(|c| c.upper()).collect::<Vec<_>>(),
        date = %settings.date,
        mode = %settings.mode,
        "Updating exchange rates"
    );

    let pb = ui::new_progress_bar(Pipeline::unit_count(&settings.currencies, settings.mode) as u64);
    pb.set_message("Sending exchange rates...");

    let mut pipeline = Pipeline::new(&feed, &firefly);
    let result = pipeline
        .run(
            &settings.currencies,
            &settings.date,
            settings.mode,
            &|_: &UnitOutcome| pb.inc(1),
        )
        .await;
    pb.finish_and_clear();

    let report = result?;
    println!("{}", ui::display_report(&report));
    Ok(report)
}
