//! Flattening enriched transactions into export rows, plus advisory
//! validation of the finished batch.

use chrono::NaiveDate;
use serde::Serialize;

use crate::enrich::{EnrichedTransaction, WindowMetrics, HORIZONS};
use crate::model::{AcquiredDisposed, Filing, Ownership, TransactionTable};

const EDGAR_ARCHIVES: &str = "https://www.sec.gov/Archives";

/// Absolute alpha beyond which a row is flagged as suspect. A 500% swing
/// against the benchmark over 90 sessions is almost always a data artifact.
const ALPHA_SANITY_LIMIT: f64 = 5.0;

/// One flat export row. Field order is the column order in the CSV output:
/// identity fields first, then filing provenance, then the valuation and
/// per-window metric columns. The `return_*`, `benchmark_return_*`, `alpha_*`
/// and `trade_value_over_market_cap` columns are fractions (0.10 is a 10%
/// move), never percentage-scaled.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRow {
    pub owner_name: String,
    pub owner_cik: String,
    pub issuer_name: String,
    pub issuer_cik: String,
    pub ticker_symbol: Option<String>,
    pub industry: Option<String>,
    pub is_director: bool,
    pub is_officer: bool,
    pub officer_title: Option<String>,
    pub security_title: Option<String>,
    pub derivative: bool,
    pub transaction_date: Option<NaiveDate>,
    pub transaction_code: Option<char>,
    pub transaction_shares: Option<f64>,
    pub transaction_price_per_share: Option<f64>,
    pub acquired_disposed_code: Option<char>,
    pub shares_owned_after_transaction: Option<f64>,
    pub ownership_nature: Option<char>,
    pub footnotes: String,
    pub accession_number: String,
    pub filing_url: String,
    pub trade_value: Option<f64>,
    pub market_cap_on_trade_date: Option<f64>,
    pub trade_value_over_market_cap: Option<f64>,
    pub price_on_trade_date: Option<f64>,
    pub price_30d_before: Option<f64>,
    pub return_30d_before: Option<f64>,
    pub benchmark_return_30d_before: Option<f64>,
    pub alpha_30d_before: Option<f64>,
    pub price_60d_before: Option<f64>,
    pub return_60d_before: Option<f64>,
    pub benchmark_return_60d_before: Option<f64>,
    pub alpha_60d_before: Option<f64>,
    pub price_90d_before: Option<f64>,
    pub return_90d_before: Option<f64>,
    pub benchmark_return_90d_before: Option<f64>,
    pub alpha_90d_before: Option<f64>,
    pub price_30d_after: Option<f64>,
    pub return_30d_after: Option<f64>,
    pub benchmark_return_30d_after: Option<f64>,
    pub alpha_30d_after: Option<f64>,
    pub price_60d_after: Option<f64>,
    pub return_60d_after: Option<f64>,
    pub benchmark_return_60d_after: Option<f64>,
    pub alpha_60d_after: Option<f64>,
    pub price_90d_after: Option<f64>,
    pub return_90d_after: Option<f64>,
    pub benchmark_return_90d_after: Option<f64>,
    pub alpha_90d_after: Option<f64>,
}

fn ad_char(ad: Option<AcquiredDisposed>) -> Option<char> {
    ad.map(|a| match a {
        AcquiredDisposed::Acquired => 'A',
        AcquiredDisposed::Disposed => 'D',
    })
}

fn ownership_char(o: Option<Ownership>) -> Option<char> {
    o.map(|o| match o {
        Ownership::Direct => 'D',
        Ownership::Indirect => 'I',
    })
}

/// Public URL for an archive-relative source path.
pub fn filing_url(source_path: &str) -> String {
    format!("{}/{}", EDGAR_ARCHIVES, source_path.trim_start_matches('/'))
}

/// Flattens one enriched transaction into an export row. `footnotes` is the
/// already-resolved footnote text for this line item; `filing` supplies the
/// provenance columns.
pub fn assemble_row(
    enriched: &EnrichedTransaction,
    footnotes: String,
    filing: &Filing,
) -> OutputRow {
    let tx = &enriched.transaction;
    let w = |m: &WindowMetrics| (m.price, m.stock_return, m.benchmark_return, m.alpha);

    let (p30b, r30b, b30b, a30b) = w(&enriched.before.h30);
    let (p60b, r60b, b60b, a60b) = w(&enriched.before.h60);
    let (p90b, r90b, b90b, a90b) = w(&enriched.before.h90);
    let (p30a, r30a, b30a, a30a) = w(&enriched.after.h30);
    let (p60a, r60a, b60a, a60a) = w(&enriched.after.h60);
    let (p90a, r90a, b90a, a90a) = w(&enriched.after.h90);

    OutputRow {
        owner_name: tx.owner_name.clone(),
        owner_cik: tx.owner_cik.clone(),
        issuer_name: tx.issuer_name.clone(),
        issuer_cik: tx.issuer_cik.clone(),
        ticker_symbol: tx.ticker.clone(),
        industry: tx.industry.clone(),
        is_director: tx.is_director,
        is_officer: tx.is_officer,
        officer_title: tx.officer_title.clone(),
        security_title: tx.security_title.clone(),
        derivative: tx.table == TransactionTable::Derivative,
        transaction_date: tx.date,
        transaction_code: tx.code.map(|c| c.as_char()),
        transaction_shares: tx.shares,
        transaction_price_per_share: tx.price_per_share,
        acquired_disposed_code: ad_char(tx.acquired_disposed),
        shares_owned_after_transaction: tx.shares_owned_after,
        ownership_nature: ownership_char(tx.ownership),
        footnotes,
        accession_number: filing.accession.clone(),
        filing_url: filing_url(&filing.source_path),
        trade_value: enriched.trade_value,
        market_cap_on_trade_date: enriched.market_cap,
        trade_value_over_market_cap: enriched.trade_value_over_market_cap,
        price_on_trade_date: enriched.price_on_trade_date,
        price_30d_before: p30b,
        return_30d_before: r30b,
        benchmark_return_30d_before: b30b,
        alpha_30d_before: a30b,
        price_60d_before: p60b,
        return_60d_before: r60b,
        benchmark_return_60d_before: b60b,
        alpha_60d_before: a60b,
        price_90d_before: p90b,
        return_90d_before: r90b,
        benchmark_return_90d_before: b90b,
        alpha_90d_before: a90b,
        price_30d_after: p30a,
        return_30d_after: r30a,
        benchmark_return_30d_after: b30a,
        alpha_30d_after: a30a,
        price_60d_after: p60a,
        return_60d_after: r60a,
        benchmark_return_60d_after: b60a,
        alpha_60d_after: a60a,
        price_90d_after: p90a,
        return_90d_after: r90a,
        benchmark_return_90d_after: b90a,
        alpha_90d_after: a90a,
    }
}

/// Advisory batch-quality report. Nothing here rejects a row; the counts go
/// to the run summary so a bad provider day is visible without silently
/// thinning the output.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub rows_total: usize,
    pub missing_ticker: usize,
    pub missing_date: usize,
    pub missing_code: usize,
    pub missing_shares_or_price: usize,
    /// Rows reporting a negative or zero price per share.
    pub nonpositive_price: usize,
    /// Rows with no trade-date price, the Python-era definition of a failed
    /// enrichment.
    pub unenriched: usize,
    pub missing_market_cap: usize,
    /// Rows where at least one horizon window is incomplete.
    pub partial_windows: usize,
    pub future_dated: usize,
    pub suspect_alpha: usize,
    /// Trade value exceeding the whole market cap.
    pub suspect_materiality: usize,
}

impl ValidationReport {
    pub fn from_rows(rows: &[OutputRow], today: NaiveDate) -> Self {
        let mut report = Self {
            rows_total: rows.len(),
            ..Self::default()
        };
        for row in rows {
            if row.ticker_symbol.as_deref().unwrap_or("").is_empty() {
                report.missing_ticker += 1;
            }
            if row.transaction_date.is_none() {
                report.missing_date += 1;
            }
            if row.transaction_code.is_none() {
                report.missing_code += 1;
            }
            if row.transaction_shares.is_none() || row.transaction_price_per_share.is_none() {
                report.missing_shares_or_price += 1;
            }
            if row.transaction_price_per_share.is_some_and(|p| p <= 0.0) {
                report.nonpositive_price += 1;
            }
            if row.price_on_trade_date.is_none() {
                report.unenriched += 1;
            }
            if row.market_cap_on_trade_date.is_none() {
                report.missing_market_cap += 1;
            }
            if Self::has_partial_window(row) {
                report.partial_windows += 1;
            }
            if row.transaction_date.is_some_and(|d| d > today) {
                report.future_dated += 1;
            }
            if Self::alphas(row)
                .into_iter()
                .flatten()
                .any(|a| a.abs() > ALPHA_SANITY_LIMIT)
            {
                report.suspect_alpha += 1;
            }
            if row
                .trade_value_over_market_cap
                .is_some_and(|pct| pct > 1.0)
            {
                report.suspect_materiality += 1;
            }
        }
        report
    }

    /// Fraction of rows that got a trade-date price.
    pub fn enrichment_rate(&self) -> f64 {
        if self.rows_total == 0 {
            return 0.0;
        }
        (self.rows_total - self.unenriched) as f64 / self.rows_total as f64
    }

    fn alphas(row: &OutputRow) -> [Option<f64>; 6] {
        [
            row.alpha_30d_before,
            row.alpha_60d_before,
            row.alpha_90d_before,
            row.alpha_30d_after,
            row.alpha_60d_after,
            row.alpha_90d_after,
        ]
    }

    fn has_partial_window(row: &OutputRow) -> bool {
        // An enriched row should have an alpha wherever it has a price.
        let pairs = [
            (row.price_30d_before, row.alpha_30d_before),
            (row.price_60d_before, row.alpha_60d_before),
            (row.price_90d_before, row.alpha_90d_before),
            (row.price_30d_after, row.alpha_30d_after),
            (row.price_60d_after, row.alpha_60d_after),
            (row.price_90d_after, row.alpha_90d_after),
        ];
        row.price_on_trade_date.is_some()
            && pairs
                .iter()
                .any(|(price, alpha)| price.is_some() && alpha.is_none())
    }
}

// Keeps the horizon constant in one place; the column set above must track it.
const _: () = assert!(HORIZONS.len() == 3);
