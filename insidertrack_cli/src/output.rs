//! CSV export and the run summary printed at the end of a pull.

use std::path::Path;

use anyhow::{Context, Result};
use insidertrack_lib::assemble::{OutputRow, ValidationReport};
use serde::Serialize;

/// One logged failure from a pull run, exported alongside the data so a bad
/// day is auditable after the fact.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub stage: String,
    pub detail: String,
}

impl ErrorRecord {
    pub fn new(stage: &str, detail: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            detail: detail.into(),
        }
    }
}

pub fn write_rows(path: &Path, rows: &[OutputRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_errors(path: &Path, errors: &[ErrorRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for record in errors {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Prints the end-of-run summary to stderr.
pub fn print_summary(
    total_parsed: usize,
    high_signal: usize,
    report: &ValidationReport,
    errors: &[ErrorRecord],
) {
    eprintln!();
    eprintln!("--- Run Summary ---");
    eprintln!("Transactions parsed: {}", total_parsed);
    eprintln!("High-signal transactions: {}", high_signal);
    eprintln!("Rows exported: {}", report.rows_total);
    eprintln!(
        "Enriched with trade-date price: {} ({:.1}%)",
        report.rows_total - report.unenriched,
        report.enrichment_rate() * 100.0
    );
    if report.missing_ticker > 0 {
        eprintln!("Rows without a ticker: {}", report.missing_ticker);
    }
    if report.missing_date > 0 {
        eprintln!("Rows without a transaction date: {}", report.missing_date);
    }
    if report.missing_code > 0 {
        eprintln!("Rows without a transaction code: {}", report.missing_code);
    }
    if report.nonpositive_price > 0 {
        eprintln!(
            "Rows with a zero or negative price: {}",
            report.nonpositive_price
        );
    }
    if report.missing_market_cap > 0 {
        eprintln!("Rows without market cap: {}", report.missing_market_cap);
    }
    if report.partial_windows > 0 {
        eprintln!("Rows with incomplete windows: {}", report.partial_windows);
    }
    if report.future_dated > 0 {
        eprintln!("Rows with future-dated transactions: {}", report.future_dated);
    }
    if report.suspect_alpha > 0 {
        eprintln!("Rows with suspect alpha: {}", report.suspect_alpha);
    }
    if report.suspect_materiality > 0 {
        eprintln!(
            "Rows with trade value above market cap: {}",
            report.suspect_materiality
        );
    }
    if errors.is_empty() {
        eprintln!("No errors were logged during the run.");
    } else {
        eprintln!("Errors logged: {}", errors.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.csv");
        let errors = vec![
            ErrorRecord::new("fetch", "edgar/data/1/acc.txt: request failed"),
            ErrorRecord::new("extract", "0000000001-25-000001: no ownership document"),
        ];
        write_errors(&path, &errors).unwrap();

        let data = std::fs::read_to_string(&path).unwrap();
        let mut lines = data.lines();
        assert_eq!(lines.next(), Some("stage,detail"));
        assert!(lines.next().unwrap().starts_with("fetch,"));
        assert!(lines.next().unwrap().starts_with("extract,"));
    }
}
