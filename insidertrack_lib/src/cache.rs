//! Run-scoped market-data cache keyed by ticker.
//!
//! The one piece of shared mutable state in the pipeline. Each key holds a
//! `OnceCell`, so concurrent requests for the same ticker wait on a single
//! in-flight fetch instead of issuing duplicates; a fetch that fails after
//! retries is memoized as absent, making the failure terminal for that
//! ticker for the rest of the run.

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::market::MarketData;
use crate::series::PriceSeries;

type SeriesCell = Arc<OnceCell<Option<Arc<PriceSeries>>>>;
type SharesCell = Arc<OnceCell<Option<f64>>>;

/// Per-run cache of price series and shares outstanding.
#[derive(Default)]
pub struct FetchCache {
    series: DashMap<String, SeriesCell>,
    shares: DashMap<String, SharesCell>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Price series for `ticker`, fetching through `provider` at most once
    /// per run. `None` means the provider could not supply the ticker.
    pub async fn price_series<P: MarketData>(
        &self,
        provider: &P,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<Arc<PriceSeries>> {
        let cell = self
            .series
            .entry(ticker.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_init(|| async {
            match provider.price_series(ticker, start, end).await {
                Ok(series) => Some(Arc::new(series)),
                Err(e) => {
                    tracing::warn!("Price series for {} unavailable: {}", ticker, e);
                    None
                }
            }
        })
        .await
        .clone()
    }

    /// Shares outstanding for `ticker`, fetched at most once per run.
    pub async fn shares_outstanding<P: MarketData>(
        &self,
        provider: &P,
        ticker: &str,
    ) -> Option<f64> {
        let cell = self
            .shares
            .entry(ticker.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        *cell
            .get_or_init(|| async {
                match provider.shares_outstanding(ticker).await {
                    Ok(v) => Some(v),
                    Err(e) => {
                        tracing::warn!("Shares outstanding for {} unavailable: {}", ticker, e);
                        None
                    }
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts fetches so tests can assert the single-fetch discipline.
    struct CountingProvider {
        series_fetches: AtomicUsize,
        shares_fetches: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new(fail: bool) -> Self {
            Self {
                series_fetches: AtomicUsize::new(0),
                shares_fetches: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl MarketData for CountingProvider {
        async fn price_series(
            &self,
            ticker: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PriceSeries, MarketError> {
            self.series_fetches.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent callers actually overlap.
            tokio::task::yield_now().await;
            if self.fail {
                Err(MarketError::RequestFailed)
            } else {
                Ok(PriceSeries::from_closes(
                    ticker,
                    [(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(), 10.0)],
                ))
            }
        }

        async fn shares_outstanding(&self, _ticker: &str) -> Result<f64, MarketError> {
            self.shares_fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MarketError::TickerNotFound("x".to_string()))
            } else {
                Ok(1_000_000.0)
            }
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn repeated_lookups_fetch_once() {
        let provider = CountingProvider::new(false);
        let cache = FetchCache::new();

        for _ in 0..5 {
            let series = cache
                .price_series(&provider, "EXPH", d(2025, 1, 1), d(2025, 6, 1))
                .await;
            assert!(series.is_some());
        }
        assert_eq!(provider.series_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_share_one_fetch() {
        let provider = Arc::new(CountingProvider::new(false));
        let cache = Arc::new(FetchCache::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let provider = Arc::clone(&provider);
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache
                    .price_series(provider.as_ref(), "EXPH", d(2025, 1, 1), d(2025, 6, 1))
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        assert_eq!(provider.series_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_memoized_for_the_run() {
        let provider = CountingProvider::new(true);
        let cache = FetchCache::new();

        for _ in 0..3 {
            let series = cache
                .price_series(&provider, "DELISTED", d(2025, 1, 1), d(2025, 6, 1))
                .await;
            assert!(series.is_none());
        }
        assert_eq!(provider.series_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_tickers_fetch_separately() {
        let provider = CountingProvider::new(false);
        let cache = FetchCache::new();

        cache
            .price_series(&provider, "AAA", d(2025, 1, 1), d(2025, 6, 1))
            .await;
        cache
            .price_series(&provider, "BBB", d(2025, 1, 1), d(2025, 6, 1))
            .await;
        assert_eq!(provider.series_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shares_cached_independently() {
        let provider = CountingProvider::new(false);
        let cache = FetchCache::new();

        assert_eq!(
            cache.shares_outstanding(&provider, "EXPH").await,
            Some(1_000_000.0)
        );
        assert_eq!(
            cache.shares_outstanding(&provider, "EXPH").await,
            Some(1_000_000.0)
        );
        assert_eq!(provider.shares_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shares_failure_memoized() {
        let provider = CountingProvider::new(true);
        let cache = FetchCache::new();

        assert_eq!(cache.shares_outstanding(&provider, "EXPH").await, None);
        assert_eq!(cache.shares_outstanding(&provider, "EXPH").await, None);
        assert_eq!(provider.shares_fetches.load(Ordering::SeqCst), 1);
    }
}
