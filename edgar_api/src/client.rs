//! HTTP client for SEC EDGAR archives.

use std::time::Duration;

use chrono::{Datelike, NaiveDate};

use crate::{index, Error, FilingRef};

/// Request timeout for EDGAR calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of attempts before a request is considered failed.
const MAX_ATTEMPTS: u32 = 3;

/// Client for the EDGAR archive endpoints.
///
/// Sends the caller-declared user agent on every request (the SEC blocks
/// anonymous scripts) and retries transient failures with a linear backoff
/// schedule: one step after the first failure, two after the second.
pub struct EdgarClient {
    base_url: String,
    user_agent: String,
    backoff_step: Duration,
}

impl EdgarClient {
    /// Creates a client pointing at the production EDGAR archive.
    ///
    /// `user_agent` must identify the operator, e.g.
    /// `"Example Research contact@example.com"`.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            base_url: "https://www.sec.gov/Archives".to_string(),
            user_agent: user_agent.into(),
            backoff_step: Duration::from_secs(5),
        }
    }

    /// Creates a client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str, user_agent: impl Into<String>) -> Self {
        Self {
            base_url: base_url.to_string(),
            user_agent: user_agent.into(),
            backoff_step: Duration::from_secs(5),
        }
    }

    /// Overrides the retry backoff step. Primarily for tests.
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    /// Fetches and parses the daily form index for `date`, returning the
    /// Form 4 entries in index order.
    pub async fn daily_index(&self, date: NaiveDate) -> Result<Vec<FilingRef>, Error> {
        let quarter = (date.month0() / 3) + 1;
        let url = format!(
            "{}/edgar/daily-index/{}/QTR{}/form.{}.idx",
            self.base_url,
            date.year(),
            quarter,
            date.format("%Y%m%d")
        );
        let body = self.get_text(&url).await?;
        Ok(index::parse_form_index(&body))
    }

    /// Fetches the raw document text of a filing by its archive-relative path
    /// (as carried on a [`FilingRef`]).
    pub async fn filing_text(&self, archive_path: &str) -> Result<String, Error> {
        let url = format!("{}/{}", self.base_url, archive_path.trim_start_matches('/'));
        self.get_text(&url).await
    }

    async fn get_text(&self, url: &str) -> Result<String, Error> {
        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed
            })?;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_get(&client, url).await {
                Ok(body) => return Ok(body),
                Err(Error::NotFound(path)) => return Err(Error::NotFound(path)),
                Err(e) if attempt == MAX_ATTEMPTS => {
                    tracing::error!("Giving up on {} after {} attempts: {}", url, attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    let wait = self.backoff_step * attempt;
                    tracing::warn!(
                        "Request for {} failed ({}), retrying in {:?}",
                        url,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
        Err(Error::RequestFailed)
    }

    async fn try_get(&self, client: &reqwest::Client, url: &str) -> Result<String, Error> {
        let resp = client.get(url).send().await.map_err(|e| {
            tracing::debug!("Transport error for {}: {}", url, e);
            Error::RequestFailed
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(url.to_string()));
        }

        let body = resp.text().await.map_err(|e| {
            tracing::debug!("Failed to read response body: {}", e);
            Error::RequestFailed
        })?;

        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

/// Trims a response body to a loggable snippet.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
