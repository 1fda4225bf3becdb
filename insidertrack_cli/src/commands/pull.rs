//! The pull pipeline: daily indexes, filing documents, extraction, signal
//! filtering, market enrichment, and CSV export.
//!
//! Uses the Semaphore + JoinSet + mpsc pattern for concurrent fetching with
//! rate limiting, with a circuit breaker that stops a run drowning in
//! consecutive failures.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use clap::Args;
use edgar_api::{EdgarClient, Error as EdgarError, FilingRef};
use indicatif::{ProgressBar, ProgressStyle};
use insidertrack_lib::assemble::{assemble_row, ValidationReport};
use insidertrack_lib::calendar::TradingCalendar;
use insidertrack_lib::enrich::{EnrichedTransaction, Enricher};
use insidertrack_lib::extractor::{extract, ParsedFiling};
use insidertrack_lib::market::YahooClient;
use insidertrack_lib::model::{Filing, Transaction, TransactionCode};
use insidertrack_lib::signal::SignalFilter;
use rand::Rng;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;

use crate::output::{self, ErrorRecord};

const CONCURRENCY: usize = 5;
const CIRCUIT_BREAKER_THRESHOLD: usize = 10;

/// Pull pipeline CLI arguments.
#[derive(Args)]
pub struct PullArgs {
    /// First filing date to pull (YYYY-MM-DD)
    #[arg(long)]
    pub from: NaiveDate,

    /// Last filing date, inclusive (defaults to --from)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Output CSV path (default: <range>_Trades.csv)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Error-log CSV path (default: <range>_errors.csv)
    #[arg(long)]
    pub errors_out: Option<PathBuf>,

    /// User agent sent to the SEC (falls back to SEC_USER_AGENT)
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Benchmark ticker used for alpha
    #[arg(long, default_value = "SPY")]
    pub benchmark: String,

    /// Transaction codes to keep, comma separated (default: P,S)
    #[arg(long, value_delimiter = ',')]
    pub codes: Vec<char>,

    /// Keep derivative-table transactions as well
    #[arg(long)]
    pub include_derivative: bool,

    /// Stop after this many filings (smoke testing)
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Message sent from fetch tasks to the receiver. `idx` is the filing's
/// position in the daily-index order, which the output must preserve.
struct FilingFetch {
    idx: usize,
    filing_ref: FilingRef,
    result: Result<String, EdgarError>,
}

/// Stops processing after consecutive failures.
struct CircuitBreaker {
    consecutive_failures: usize,
    threshold: usize,
}

impl CircuitBreaker {
    fn new(threshold: usize) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    fn is_tripped(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }
}

/// A high-signal transaction waiting for enrichment, with its filing index
/// and resolved footnote text.
struct PendingRow {
    filing_idx: usize,
    tx: Transaction,
    footnotes: String,
}

fn default_file_name(from: NaiveDate, to: NaiveDate, suffix: &str) -> PathBuf {
    if from == to {
        PathBuf::from(format!("{}_{}.csv", from.format("%Y-%m-%d"), suffix))
    } else {
        PathBuf::from(format!(
            "{}_to_{}_{}.csv",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
            suffix
        ))
    }
}

fn progress_bar(len: u64, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({eta}) {msg}",
        )
        .unwrap(),
    );
    pb.set_message(message);
    pb
}

/// Drains fetch results into daily-index order. Tasks complete in arbitrary
/// order, so each parsed filing lands in the slot its index points at and
/// failed fetches leave gaps that are dropped at the end. Returns the ordered
/// filings, the transaction count, and whether the breaker tripped.
async fn collect_filings(
    mut rx: mpsc::Receiver<FilingFetch>,
    total: usize,
    errors: &mut Vec<ErrorRecord>,
    pb: &ProgressBar,
) -> (Vec<(Filing, ParsedFiling)>, usize, bool) {
    let mut slots: Vec<Option<(Filing, ParsedFiling)>> = (0..total).map(|_| None).collect();
    let mut total_parsed = 0usize;
    let mut breaker = CircuitBreaker::new(CIRCUIT_BREAKER_THRESHOLD);

    while let Some(fetch) = rx.recv().await {
        match fetch.result {
            Ok(text) => {
                breaker.record_success();
                let filing = Filing {
                    accession: fetch.filing_ref.accession,
                    cik: fetch.filing_ref.cik,
                    date_filed: fetch.filing_ref.date_filed,
                    source_path: fetch.filing_ref.path,
                    text,
                };
                match extract(&filing.text) {
                    Ok(parsed) => {
                        total_parsed += parsed.transactions.len();
                        for warning in &parsed.warnings {
                            errors.push(ErrorRecord::new(
                                "extract",
                                format!("{}: {}", filing.accession, warning),
                            ));
                        }
                        slots[fetch.idx] = Some((filing, parsed));
                    }
                    Err(e) => {
                        errors.push(ErrorRecord::new(
                            "extract",
                            format!("{}: {}", filing.accession, e),
                        ));
                    }
                }
            }
            Err(e) => {
                breaker.record_failure();
                errors.push(ErrorRecord::new(
                    "fetch",
                    format!("{}: {}", fetch.filing_ref.path, e),
                ));
            }
        }
        pb.inc(1);

        if breaker.is_tripped() {
            pb.println(format!(
                "Circuit breaker tripped after {} consecutive failures, stopping fetch",
                CIRCUIT_BREAKER_THRESHOLD
            ));
            break;
        }
    }

    let tripped = breaker.is_tripped();
    (slots.into_iter().flatten().collect(), total_parsed, tripped)
}

/// Run the pull pipeline.
pub async fn run(args: &PullArgs) -> Result<()> {
    let to = args.to.unwrap_or(args.from);
    if to < args.from {
        bail!("--to {} is before --from {}", to, args.from);
    }

    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| std::env::var("SEC_USER_AGENT").ok())
        .ok_or_else(|| {
            anyhow!("No user agent: pass --user-agent or set SEC_USER_AGENT (the SEC requires one)")
        })?;

    let edgar = Arc::new(EdgarClient::new(&user_agent));
    let mut errors: Vec<ErrorRecord> = Vec::new();

    // Step 1: daily indexes. Weekends have no index; a missing weekday index
    // (market holiday) is skipped, not an error.
    let mut filing_refs: Vec<FilingRef> = Vec::new();
    let mut day = args.from;
    while day <= to {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            match edgar.daily_index(day).await {
                Ok(refs) => {
                    tracing::info!("{}: {} Form 4 filings in index", day, refs.len());
                    filing_refs.extend(refs);
                }
                Err(EdgarError::NotFound(_)) => {
                    tracing::info!("{}: no daily index (holiday or not yet published)", day);
                }
                Err(e) => {
                    errors.push(ErrorRecord::new("index", format!("{}: {}", day, e)));
                }
            }
        }
        day = day.succ_opt().context("date overflow")?;
    }

    if let Some(limit) = args.limit {
        filing_refs.truncate(limit);
    }
    if filing_refs.is_empty() {
        eprintln!("No Form 4 filings found for {} to {}", args.from, to);
        return Ok(());
    }
    let total_filings = filing_refs.len();
    eprintln!("Fetching {} Form 4 filings", total_filings);

    // Step 2: fetch filing documents concurrently.
    let pb = progress_bar(total_filings as u64, "fetching filings...");
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let (tx, rx) = mpsc::channel::<FilingFetch>(CONCURRENCY * 2);
    let mut join_set = JoinSet::new();

    for (idx, filing_ref) in filing_refs.into_iter().enumerate() {
        let sem = Arc::clone(&semaphore);
        let sender = tx.clone();
        let edgar = Arc::clone(&edgar);

        join_set.spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            // Rate limiting with jittered delay; the SEC caps request rates.
            let delay_ms = rand::thread_rng().gen_range(200..500);
            sleep(Duration::from_millis(delay_ms)).await;

            let result = edgar.filing_text(&filing_ref.path).await;
            let _ = sender
                .send(FilingFetch {
                    idx,
                    filing_ref,
                    result,
                })
                .await;
        });
    }
    drop(tx);

    let (filings, total_parsed, tripped) =
        collect_filings(rx, total_filings, &mut errors, &pb).await;
    if tripped {
        join_set.abort_all();
    }
    pb.finish_with_message(format!("{} filings parsed", filings.len()));

    // Step 3: signal filtering and footnote resolution.
    let filter = if args.codes.is_empty() {
        SignalFilter::default()
    } else {
        SignalFilter::with_codes(args.codes.iter().copied().map(TransactionCode::from))
    }
    .include_derivative(args.include_derivative);

    let mut pending: Vec<PendingRow> = Vec::new();
    for (filing_idx, (_, parsed)) in filings.iter().enumerate() {
        for tx in parsed.transactions.iter().filter(|t| filter.accepts(t)) {
            pending.push(PendingRow {
                filing_idx,
                tx: tx.clone(),
                footnotes: parsed.footnote_text(tx),
            });
        }
    }

    let high_signal = pending.len();
    if pending.is_empty() {
        eprintln!(
            "No high-signal transactions in {} filings ({} transactions parsed)",
            filings.len(),
            total_parsed
        );
        return Ok(());
    }
    eprintln!("Enriching {} high-signal transactions", high_signal);

    // Step 4: market enrichment. One series fetch per distinct ticker; the
    // fetch window is derived from the trade dates actually seen.
    let trade_dates: Vec<NaiveDate> = pending.iter().filter_map(|p| p.tx.date).collect();
    let trade_start = trade_dates.iter().min().copied().unwrap_or(args.from);
    let trade_end = trade_dates.iter().max().copied().unwrap_or(to);

    let yahoo = YahooClient::new().map_err(|e| anyhow!("Failed to create market client: {}", e))?;
    let enricher = Arc::new(Enricher::new(
        yahoo,
        TradingCalendar::through_today(),
        args.benchmark.clone(),
        trade_start,
        trade_end,
    ));

    let distinct_tickers: HashSet<&str> = pending
        .iter()
        .filter_map(|p| p.tx.ticker.as_deref())
        .collect();
    tracing::info!(
        "{} distinct tickers across {} transactions",
        distinct_tickers.len(),
        high_signal
    );

    let pb = progress_bar(high_signal as u64, "enriching...");
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let mut join_set = JoinSet::new();

    for (idx, row) in pending.iter().enumerate() {
        let sem = Arc::clone(&semaphore);
        let enricher = Arc::clone(&enricher);
        let tx = row.tx.clone();

        join_set.spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            let delay_ms = rand::thread_rng().gen_range(200..500);
            sleep(Duration::from_millis(delay_ms)).await;

            (idx, enricher.enrich(&tx).await)
        });
    }

    let mut enriched: Vec<Option<EnrichedTransaction>> = (0..high_signal).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (idx, result) = joined.context("enrichment task panicked")?;
        match result {
            Ok(e) => enriched[idx] = Some(e),
            Err(e) => {
                let accession = &filings[pending[idx].filing_idx].0.accession;
                errors.push(ErrorRecord::new(
                    "enrich",
                    format!("{}: {}", accession, e),
                ));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("enrichment done");

    // Step 5: assemble and export.
    let rows: Vec<_> = pending
        .iter()
        .zip(enriched)
        .filter_map(|(p, e)| {
            e.map(|e| assemble_row(&e, p.footnotes.clone(), &filings[p.filing_idx].0))
        })
        .collect();

    let out_path = args
        .out
        .clone()
        .unwrap_or_else(|| default_file_name(args.from, to, "Trades"));
    output::write_rows(&out_path, &rows)?;
    eprintln!("Exported {} rows to {}", rows.len(), out_path.display());

    let report = ValidationReport::from_rows(&rows, Utc::now().date_naive());
    output::print_summary(total_parsed, high_signal, &report, &errors);

    if !errors.is_empty() {
        let errors_path = args
            .errors_out
            .clone()
            .unwrap_or_else(|| default_file_name(args.from, to, "errors"));
        output::write_errors(&errors_path, &errors)?;
        eprintln!("Error log written to {}", errors_path.display());
    }

    Ok(())
}
