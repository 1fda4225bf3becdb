//! Performance enrichment: pre/post-trade returns, alpha, and materiality.
//!
//! The computation itself is a pure function over the transaction, the two
//! price series, and the trading calendar; the [`Enricher`] wrapper adds the
//! provider plumbing (lazy fetches through the run cache). Any price point
//! that cannot be obtained makes exactly that metric absent. Nothing is ever
//! substituted or zero-filled.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::cache::FetchCache;
use crate::calendar::TradingCalendar;
use crate::market::MarketData;
use crate::model::Transaction;
use crate::series::PriceSeries;

/// Enrichment horizons, in trading sessions.
pub const HORIZONS: [i64; 3] = [30, 60, 90];

/// Calendar-day padding around the trade-date range when fetching series,
/// wide enough to cover 90 sessions plus holidays on either side.
const FETCH_MARGIN_DAYS: i64 = 200;

/// Transactions for which returns and materiality are undefined.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum EnrichError {
    #[error("Zero shares make trade value and materiality undefined")]
    ZeroShares,
    #[error("Zero price per share makes trade value and materiality undefined")]
    ZeroPrice,
}

/// Metrics for one horizon in one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindowMetrics {
    /// Close price at the resolved offset session.
    pub price: Option<f64>,
    /// Fractional simple return over the window, later over earlier.
    pub stock_return: Option<f64>,
    /// Benchmark fractional return over the same window.
    pub benchmark_return: Option<f64>,
    /// `stock_return - benchmark_return`, signed.
    pub alpha: Option<f64>,
}

/// The 30/60/90-session window set for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HorizonMetrics {
    pub h30: WindowMetrics,
    pub h60: WindowMetrics,
    pub h90: WindowMetrics,
}

impl HorizonMetrics {
    pub fn get(&self, horizon: i64) -> Option<&WindowMetrics> {
        match horizon {
            30 => Some(&self.h30),
            60 => Some(&self.h60),
            90 => Some(&self.h90),
            _ => None,
        }
    }

    fn slot(&mut self, horizon: i64) -> &mut WindowMetrics {
        match horizon {
            30 => &mut self.h30,
            60 => &mut self.h60,
            _ => &mut self.h90,
        }
    }
}

/// A transaction with its computed performance metrics. Every metric is
/// individually optional; the underlying transaction fields are untouched.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedTransaction {
    pub transaction: Transaction,
    /// The actual session the trade date resolved to.
    pub trade_session: Option<NaiveDate>,
    pub price_on_trade_date: Option<f64>,
    pub market_cap: Option<f64>,
    pub trade_value: Option<f64>,
    /// Trade value as a fraction of market capitalization.
    pub trade_value_over_market_cap: Option<f64>,
    pub before: HorizonMetrics,
    pub after: HorizonMetrics,
}

impl EnrichedTransaction {
    /// A transaction carried through with every metric absent. Used when no
    /// price data exists for the ticker or enrichment was rejected.
    pub fn unenriched(transaction: Transaction) -> Self {
        Self {
            transaction,
            trade_session: None,
            price_on_trade_date: None,
            market_cap: None,
            trade_value: None,
            trade_value_over_market_cap: None,
            before: HorizonMetrics::default(),
            after: HorizonMetrics::default(),
        }
    }
}

/// Simple fractional return, later over earlier. Series only hold positive
/// closes, so the division is safe.
fn simple_return(earlier: f64, later: f64) -> f64 {
    later / earlier - 1.0
}

/// Computes all metrics for one transaction from already-fetched inputs.
///
/// Zero-share and zero-price transactions are rejected. Everything else is
/// best-effort: a missing ticker, date, or price point leaves the affected
/// metrics absent without touching the rest.
pub fn enrich(
    tx: &Transaction,
    stock: Option<&PriceSeries>,
    benchmark: Option<&PriceSeries>,
    shares_outstanding: Option<f64>,
    calendar: &TradingCalendar,
) -> Result<EnrichedTransaction, EnrichError> {
    if tx.shares == Some(0.0) {
        return Err(EnrichError::ZeroShares);
    }
    if tx.price_per_share == Some(0.0) {
        return Err(EnrichError::ZeroPrice);
    }

    let mut out = EnrichedTransaction::unenriched(tx.clone());

    out.trade_value = match (tx.shares, tx.price_per_share) {
        (Some(shares), Some(price)) => Some(shares * price),
        _ => None,
    };

    let session = match tx.date.and_then(|d| calendar.resolve(d)) {
        Some(s) => s,
        None => return Ok(out),
    };
    out.trade_session = Some(session);

    let base_price = stock.and_then(|s| s.close_on(session));
    let bench_base = benchmark.and_then(|b| b.close_on(session));
    out.price_on_trade_date = base_price;

    out.market_cap = match (shares_outstanding, base_price) {
        (Some(shares), Some(price)) => Some(shares * price),
        _ => None,
    };
    out.trade_value_over_market_cap = match (out.trade_value, out.market_cap) {
        (Some(value), Some(cap)) if cap > 0.0 => Some(value / cap),
        _ => None,
    };

    for horizon in HORIZONS {
        for backward in [true, false] {
            let n = if backward { -horizon } else { horizon };
            let window = if backward {
                out.before.slot(horizon)
            } else {
                out.after.slot(horizon)
            };

            let Some(target) = calendar.offset(session, n) else {
                continue;
            };

            let offset_price = stock.and_then(|s| s.close_on(target));
            window.price = offset_price;
            window.stock_return = match (base_price, offset_price) {
                (Some(base), Some(offset)) if backward => Some(simple_return(offset, base)),
                (Some(base), Some(offset)) => Some(simple_return(base, offset)),
                _ => None,
            };

            let bench_offset = benchmark.and_then(|b| b.close_on(target));
            window.benchmark_return = match (bench_base, bench_offset) {
                (Some(base), Some(offset)) if backward => Some(simple_return(offset, base)),
                (Some(base), Some(offset)) => Some(simple_return(base, offset)),
                _ => None,
            };

            window.alpha = match (window.stock_return, window.benchmark_return) {
                (Some(stock_r), Some(bench_r)) => Some(stock_r - bench_r),
                _ => None,
            };
        }
    }

    Ok(out)
}

/// Provider-backed enricher for a run: owns the per-run cache and the fetch
/// window, delegates the math to [`enrich`].
pub struct Enricher<P> {
    provider: P,
    cache: FetchCache,
    calendar: TradingCalendar,
    benchmark_ticker: String,
    fetch_start: NaiveDate,
    fetch_end: NaiveDate,
}

impl<P: MarketData> Enricher<P> {
    /// `trade_start..=trade_end` is the range of trade dates in the run;
    /// series are fetched with enough margin to cover every horizon.
    pub fn new(
        provider: P,
        calendar: TradingCalendar,
        benchmark_ticker: impl Into<String>,
        trade_start: NaiveDate,
        trade_end: NaiveDate,
    ) -> Self {
        Self {
            provider,
            cache: FetchCache::new(),
            calendar,
            benchmark_ticker: benchmark_ticker.into(),
            fetch_start: trade_start - Duration::days(FETCH_MARGIN_DAYS),
            fetch_end: trade_end + Duration::days(FETCH_MARGIN_DAYS),
        }
    }

    /// Enriches one high-signal transaction, fetching series and shares
    /// outstanding through the run cache as needed.
    pub async fn enrich(&self, tx: &Transaction) -> Result<EnrichedTransaction, EnrichError> {
        let Some(ticker) = tx.ticker.as_deref().filter(|t| !t.is_empty()) else {
            return enrich(tx, None, None, None, &self.calendar);
        };

        let stock = self
            .cache
            .price_series(&self.provider, ticker, self.fetch_start, self.fetch_end)
            .await;
        let benchmark = self
            .cache
            .price_series(
                &self.provider,
                &self.benchmark_ticker,
                self.fetch_start,
                self.fetch_end,
            )
            .await;
        let shares_outstanding = self.cache.shares_outstanding(&self.provider, ticker).await;

        enrich(
            tx,
            stock.as_deref(),
            benchmark.as_deref(),
            shares_outstanding,
            &self.calendar,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::is_session;
    use crate::model::{TransactionCode, TransactionTable};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn calendar() -> TradingCalendar {
        TradingCalendar::new(d(2020, 1, 2), d(2030, 12, 31))
    }

    fn purchase(shares: Option<f64>, price: Option<f64>, date: Option<NaiveDate>) -> Transaction {
        Transaction {
            owner_name: "SMITH JOHN Q".to_string(),
            owner_cik: "0001494730".to_string(),
            is_director: true,
            is_officer: false,
            officer_title: None,
            issuer_name: "EXAMPLE PHARMA INC".to_string(),
            issuer_cik: "0001318605".to_string(),
            ticker: Some("EXPH".to_string()),
            industry: None,
            security_title: Some("Common Stock".to_string()),
            table: TransactionTable::NonDerivative,
            date,
            code: Some(TransactionCode::Purchase),
            shares,
            price_per_share: price,
            acquired_disposed: None,
            shares_owned_after: None,
            ownership: None,
            footnote_refs: Vec::new(),
        }
    }

    /// Flat series: every session in the span closes at `price`.
    fn flat_series(ticker: &str, from: NaiveDate, to: NaiveDate, price: f64) -> PriceSeries {
        let mut closes = Vec::new();
        let mut day = from;
        while day <= to {
            if is_session(day) {
                closes.push((day, price));
            }
            day += Duration::days(1);
        }
        PriceSeries::from_closes(ticker, closes)
    }

    /// Flat series with a single overridden close.
    fn series_with_spike(
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
        base: f64,
        spike_at: NaiveDate,
        spike: f64,
    ) -> PriceSeries {
        let mut closes = Vec::new();
        let mut day = from;
        while day <= to {
            if is_session(day) {
                closes.push((day, if day == spike_at { spike } else { base }));
            }
            day += Duration::days(1);
        }
        PriceSeries::from_closes(ticker, closes)
    }

    #[test]
    fn purchase_with_ten_percent_move_over_flat_benchmark() {
        // Purchase of 1,000 shares at $10 on a Monday; stock at $10 on the
        // trade date and $11 thirty sessions later; benchmark flat.
        let cal = calendar();
        let trade = d(2025, 3, 3);
        let plus_30 = cal.offset(trade, 30).unwrap();

        let stock = series_with_spike("EXPH", d(2024, 10, 1), d(2025, 9, 1), 10.0, plus_30, 11.0);
        let bench = flat_series("SPY", d(2024, 10, 1), d(2025, 9, 1), 500.0);
        let tx = purchase(Some(1000.0), Some(10.0), Some(trade));

        let enriched = enrich(&tx, Some(&stock), Some(&bench), Some(50_000_000.0), &cal).unwrap();

        assert_eq!(enriched.trade_session, Some(trade));
        assert_eq!(enriched.price_on_trade_date, Some(10.0));
        let w = &enriched.after.h30;
        assert!((w.stock_return.unwrap() - 0.10).abs() < 1e-12);
        assert_eq!(w.benchmark_return, Some(0.0));
        assert!((w.alpha.unwrap() - 0.10).abs() < 1e-12);
    }

    #[test]
    fn alpha_is_exactly_stock_minus_benchmark() {
        let cal = calendar();
        let trade = d(2025, 3, 3);
        let plus_60 = cal.offset(trade, 60).unwrap();

        let stock = series_with_spike("EXPH", d(2024, 10, 1), d(2025, 9, 1), 20.0, plus_60, 25.0);
        let bench = series_with_spike("SPY", d(2024, 10, 1), d(2025, 9, 1), 100.0, plus_60, 104.0);
        let tx = purchase(Some(100.0), Some(20.0), Some(trade));

        let enriched = enrich(&tx, Some(&stock), Some(&bench), None, &cal).unwrap();
        let w = &enriched.after.h60;
        let expected = w.stock_return.unwrap() - w.benchmark_return.unwrap();
        assert_eq!(w.alpha, Some(expected));
        assert!((w.stock_return.unwrap() - 0.25).abs() < 1e-12);
        assert!((w.benchmark_return.unwrap() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn backward_window_uses_later_over_earlier() {
        let cal = calendar();
        let trade = d(2025, 3, 3);
        let minus_30 = cal.offset(trade, -30).unwrap();

        // Stock was at $8 thirty sessions before and $10 on the trade date:
        // the pre-window return is +25%.
        let stock = series_with_spike("EXPH", d(2024, 10, 1), d(2025, 9, 1), 10.0, minus_30, 8.0);
        let tx = purchase(Some(100.0), Some(10.0), Some(trade));

        let enriched = enrich(&tx, Some(&stock), None, None, &cal).unwrap();
        let w = &enriched.before.h30;
        assert_eq!(w.price, Some(8.0));
        assert!((w.stock_return.unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(w.benchmark_return, None);
        assert_eq!(w.alpha, None);
    }

    #[test]
    fn no_price_data_leaves_all_metrics_absent() {
        let cal = calendar();
        let tx = purchase(Some(1000.0), Some(10.0), Some(d(2025, 3, 3)));
        let enriched = enrich(&tx, None, None, None, &cal).unwrap();

        assert_eq!(enriched.price_on_trade_date, None);
        assert_eq!(enriched.market_cap, None);
        assert_eq!(enriched.trade_value_over_market_cap, None);
        for h in HORIZONS {
            assert_eq!(enriched.after.get(h).unwrap().stock_return, None);
            assert_eq!(enriched.before.get(h).unwrap().alpha, None);
        }
        // Transaction fields remain intact.
        assert_eq!(enriched.transaction.shares, Some(1000.0));
        assert_eq!(enriched.trade_value, Some(10_000.0));
    }

    #[test]
    fn missing_price_point_affects_only_that_horizon() {
        let cal = calendar();
        let trade = d(2025, 3, 3);
        let plus_60 = cal.offset(trade, 60).unwrap();

        // Build a full series, then knock out the +60 session.
        let mut closes = Vec::new();
        let mut day = d(2024, 10, 1);
        while day <= d(2025, 9, 1) {
            if is_session(day) && day != plus_60 {
                closes.push((day, 10.0));
            }
            day += Duration::days(1);
        }
        let stock = PriceSeries::from_closes("EXPH", closes);
        let bench = flat_series("SPY", d(2024, 10, 1), d(2025, 9, 1), 500.0);

        let tx = purchase(Some(100.0), Some(10.0), Some(trade));
        let enriched = enrich(&tx, Some(&stock), Some(&bench), None, &cal).unwrap();

        assert_eq!(enriched.after.h60.stock_return, None);
        assert_eq!(enriched.after.h60.alpha, None);
        // Benchmark had the session, so its side is still present.
        assert_eq!(enriched.after.h60.benchmark_return, Some(0.0));
        // The other horizons are unaffected.
        assert_eq!(enriched.after.h30.stock_return, Some(0.0));
        assert_eq!(enriched.after.h90.stock_return, Some(0.0));
    }

    #[test]
    fn window_outside_history_is_absent() {
        // Calendar ends right after the trade date: every forward window is
        // unavailable, every backward window resolvable.
        let cal = TradingCalendar::new(d(2024, 1, 2), d(2025, 3, 7));
        let trade = d(2025, 3, 3);
        let stock = flat_series("EXPH", d(2024, 1, 2), d(2025, 3, 7), 10.0);

        let tx = purchase(Some(100.0), Some(10.0), Some(trade));
        let enriched = enrich(&tx, Some(&stock), None, None, &cal).unwrap();

        for h in HORIZONS {
            assert_eq!(enriched.after.get(h).unwrap().stock_return, None);
            assert!(enriched.before.get(h).unwrap().stock_return.is_some());
        }
    }

    #[test]
    fn weekend_trade_date_resolves_forward() {
        let cal = calendar();
        let saturday = d(2025, 3, 1);
        let stock = flat_series("EXPH", d(2024, 10, 1), d(2025, 9, 1), 10.0);

        let tx = purchase(Some(100.0), Some(10.0), Some(saturday));
        let enriched = enrich(&tx, Some(&stock), None, None, &cal).unwrap();
        assert_eq!(enriched.trade_session, Some(d(2025, 3, 3)));
        assert_eq!(enriched.price_on_trade_date, Some(10.0));
    }

    #[test]
    fn market_cap_and_materiality() {
        let cal = calendar();
        let stock = flat_series("EXPH", d(2024, 10, 1), d(2025, 9, 1), 10.0);
        let tx = purchase(Some(1000.0), Some(10.0), Some(d(2025, 3, 3)));

        let enriched = enrich(&tx, Some(&stock), None, Some(50_000_000.0), &cal).unwrap();
        assert_eq!(enriched.market_cap, Some(500_000_000.0));
        assert_eq!(enriched.trade_value, Some(10_000.0));
        assert!((enriched.trade_value_over_market_cap.unwrap() - 2e-5).abs() < 1e-15);
    }

    #[test]
    fn zero_shares_rejected() {
        let cal = calendar();
        let tx = purchase(Some(0.0), Some(10.0), Some(d(2025, 3, 3)));
        assert_eq!(
            enrich(&tx, None, None, None, &cal).unwrap_err(),
            EnrichError::ZeroShares
        );
    }

    #[test]
    fn zero_price_rejected() {
        let cal = calendar();
        let tx = purchase(Some(100.0), Some(0.0), Some(d(2025, 3, 3)));
        assert_eq!(
            enrich(&tx, None, None, None, &cal).unwrap_err(),
            EnrichError::ZeroPrice
        );
    }

    #[test]
    fn missing_date_yields_unenriched_row() {
        let cal = calendar();
        let tx = purchase(Some(100.0), Some(10.0), None);
        let enriched = enrich(&tx, None, None, None, &cal).unwrap();
        assert_eq!(enriched.trade_session, None);
        assert_eq!(enriched.price_on_trade_date, None);
        // Trade value needs no price data.
        assert_eq!(enriched.trade_value, Some(1000.0));
    }

    #[tokio::test]
    async fn enricher_skips_fetch_without_ticker() {
        struct PanickingProvider;
        impl MarketData for PanickingProvider {
            async fn price_series(
                &self,
                _: &str,
                _: NaiveDate,
                _: NaiveDate,
            ) -> Result<PriceSeries, crate::market::MarketError> {
                panic!("must not fetch");
            }
            async fn shares_outstanding(&self, _: &str) -> Result<f64, crate::market::MarketError> {
                panic!("must not fetch");
            }
        }

        let enricher = Enricher::new(
            PanickingProvider,
            calendar(),
            "SPY",
            d(2025, 3, 3),
            d(2025, 3, 7),
        );
        let mut tx = purchase(Some(100.0), Some(10.0), Some(d(2025, 3, 3)));
        tx.ticker = None;
        let enriched = enricher.enrich(&tx).await.unwrap();
        assert_eq!(enriched.price_on_trade_date, None);
    }
}
