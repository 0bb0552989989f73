use crate::core::{RunReport, UnitStatus};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Success,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Success => style(text).green().bold(),
        StyleType::Error => style(text).red().bold(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

pub fn status_cell(status: &UnitStatus) -> Cell {
    match status {
        UnitStatus::Sent { .. } => Cell::new("sent").fg(Color::Green),
        UnitStatus::Skipped { stage, .. } => Cell::new(format!("{stage} failed")).fg(Color::Red),
    }
}

/// Creates a new `indicatif::ProgressBar` with standard styling.
pub fn new_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Renders the outcome of every unit of work followed by a one-line total.
pub fn display_report(report: &RunReport) -> String {
    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell(if report.outcomes.first().is_some_and(|o| o.label.contains('/')) {
            "Pair"
        } else {
            "Base"
        }),
        header_cell("Status"),
        header_cell("Details"),
    ]);

    for outcome in &report.outcomes {
        let details = match &outcome.status {
            UnitStatus::Sent { rates, date } => format!("{rates} rate(s) for {date}"),
            UnitStatus::Skipped { reason, .. } => reason.clone(),
        };
        table.add_row(vec![
            Cell::new(&outcome.label),
            status_cell(&outcome.status),
            Cell::new(details),
        ]);
    }

    let total_style = if report.skipped() == 0 {
        StyleType::Success
    } else {
        StyleType::Error
    };
    let summary = format!("{} sent, {} skipped", report.sent(), report.skipped());

    format!(
        "{}\n\n{}\n\n{} {}",
        style_text(&format!("Exchange rates ({} mode)", report.mode), StyleType::Title),
        table,
        style_text("Result:", StyleType::Subtle),
        style_text(&summary, total_style)
    )
}
