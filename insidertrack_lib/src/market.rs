//! Market-data provider interface and the Yahoo Finance implementation.
//!
//! The enrichment engine only needs two operations, so the provider surface
//! is kept that narrow: a close-price series over a date range and a shares
//! outstanding figure. Anything implementing [`MarketData`] can back a run,
//! which is how the tests swap in a deterministic in-memory provider.

use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use rand::Rng;
use serde::Deserialize;

use crate::series::PriceSeries;

/// Request timeout for provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts per request before the ticker is declared unavailable.
const MAX_ATTEMPTS: u32 = 3;

/// Errors from market-data retrieval.
#[derive(thiserror::Error, Debug)]
pub enum MarketError {
    #[error("Ticker not found: {0}")]
    TickerNotFound(String),
    #[error("Rate limited by provider")]
    RateLimited,
    #[error("Request failed")]
    RequestFailed,
    #[error("Failed to parse provider response: {0}")]
    ParseFailed(String),
}

/// Narrow market-data surface consumed by the enrichment engine.
pub trait MarketData {
    /// Daily close series for `ticker` covering `[start, end]` inclusive.
    fn price_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl std::future::Future<Output = Result<PriceSeries, MarketError>> + Send;

    /// Current shares outstanding for `ticker`.
    fn shares_outstanding(
        &self,
        ticker: &str,
    ) -> impl std::future::Future<Output = Result<f64, MarketError>> + Send;
}

// ---------------------------------------------------------------------------
// Yahoo Finance wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: ChartOuter,
}

#[derive(Deserialize)]
struct ChartOuter {
    result: Option<Vec<ChartResult>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    code: String,
}

#[derive(Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryOuter,
}

#[derive(Deserialize)]
struct SummaryOuter {
    result: Option<Vec<SummaryResult>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct SummaryResult {
    #[serde(rename = "defaultKeyStatistics")]
    default_key_statistics: Option<KeyStats>,
}

#[derive(Deserialize)]
struct KeyStats {
    #[serde(rename = "sharesOutstanding")]
    shares_outstanding: Option<RawValue>,
}

#[derive(Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Yahoo Finance chart/quoteSummary client.
///
/// Transient failures (transport errors, 429, 5xx) are retried with a
/// jittered linear backoff; ticker-not-found is returned immediately so the
/// caller can mark the ticker absent without burning retries.
pub struct YahooClient {
    client: reqwest::Client,
    base_url: String,
    backoff_step: Duration,
}

impl YahooClient {
    /// Client against the production Yahoo endpoints.
    pub fn new() -> Result<Self, MarketError> {
        Self::with_base_url("https://query1.finance.yahoo.com")
    }

    /// Client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Result<Self, MarketError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|_| MarketError::RequestFailed)?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            backoff_step: Duration::from_millis(500),
        })
    }

    /// Overrides the retry backoff step. Primarily for tests.
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    async fn get_json(&self, url: &str, ticker: &str) -> Result<String, MarketError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            tracing::debug!("Transport error for {}: {}", url, e);
            MarketError::RequestFailed
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketError::TickerNotFound(ticker.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketError::RateLimited);
        }
        if !status.is_success() {
            tracing::debug!("Provider returned {} for {}", status, url);
            return Err(MarketError::RequestFailed);
        }

        resp.text().await.map_err(|_| MarketError::RequestFailed)
    }

    async fn fetch_chart_once(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, MarketError> {
        let period1 = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        // End of the last requested day, so the range is inclusive.
        let period2 = end
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(period1);
        let url = format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d",
            self.base_url, ticker, period1, period2
        );

        let body = self.get_json(&url, ticker).await?;
        let envelope: ChartEnvelope = serde_json::from_str(&body)
            .map_err(|e| MarketError::ParseFailed(format!("chart response: {}", e)))?;

        if let Some(err) = envelope.chart.error {
            if err.code.eq_ignore_ascii_case("not found") {
                return Err(MarketError::TickerNotFound(ticker.to_string()));
            }
            return Err(MarketError::ParseFailed(format!(
                "provider error code {}",
                err.code
            )));
        }

        let result = envelope
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| MarketError::TickerNotFound(ticker.to_string()))?;

        let timestamps = result.timestamp.unwrap_or_default();
        let closes = result
            .indicators
            .quote
            .into_iter()
            .next()
            .and_then(|q| q.close)
            .unwrap_or_default();

        let pairs = timestamps
            .into_iter()
            .zip(closes)
            .filter_map(|(ts, close)| {
                let date = DateTime::from_timestamp(ts, 0)?.date_naive();
                Some((date, close?))
            });
        Ok(PriceSeries::from_closes(ticker, pairs))
    }

    async fn fetch_shares_once(&self, ticker: &str) -> Result<f64, MarketError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules=defaultKeyStatistics",
            self.base_url, ticker
        );
        let body = self.get_json(&url, ticker).await?;
        let envelope: SummaryEnvelope = serde_json::from_str(&body)
            .map_err(|e| MarketError::ParseFailed(format!("quoteSummary response: {}", e)))?;

        if let Some(err) = envelope.quote_summary.error {
            if err.code.eq_ignore_ascii_case("not found") {
                return Err(MarketError::TickerNotFound(ticker.to_string()));
            }
            return Err(MarketError::ParseFailed(format!(
                "provider error code {}",
                err.code
            )));
        }

        envelope
            .quote_summary
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .and_then(|r| r.default_key_statistics)
            .and_then(|k| k.shares_outstanding)
            .and_then(|v| v.raw)
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| MarketError::TickerNotFound(ticker.to_string()))
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0..250);
        self.backoff_step * attempt + Duration::from_millis(jitter)
    }
}

impl MarketData for YahooClient {
    async fn price_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, MarketError> {
        let mut last = MarketError::RequestFailed;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.fetch_chart_once(ticker, start, end).await {
                Ok(series) => return Ok(series),
                Err(e @ (MarketError::TickerNotFound(_) | MarketError::ParseFailed(_))) => {
                    return Err(e)
                }
                Err(e) => {
                    last = e;
                    if attempt < MAX_ATTEMPTS {
                        let wait = self.retry_delay(attempt);
                        tracing::warn!(
                            "Chart fetch for {} failed ({}), retrying in {:?}",
                            ticker,
                            last,
                            wait
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
        Err(last)
    }

    async fn shares_outstanding(&self, ticker: &str) -> Result<f64, MarketError> {
        let mut last = MarketError::RequestFailed;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.fetch_shares_once(ticker).await {
                Ok(v) => return Ok(v),
                Err(e @ (MarketError::TickerNotFound(_) | MarketError::ParseFailed(_))) => {
                    return Err(e)
                }
                Err(e) => {
                    last = e;
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay(attempt)).await;
                    }
                }
            }
        }
        Err(last)
    }
}
