//! Error types for the EDGAR client.

/// Errors that can occur when talking to EDGAR.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request failed after all retry attempts (network error or timeout).
    #[error("Request failed after retries")]
    RequestFailed,
    /// The requested index or filing does not exist on EDGAR.
    #[error("Resource not found: {0}")]
    NotFound(String),
    /// EDGAR returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
}
