//! Minimal SEC EDGAR retrieval client: daily form indexes and filing documents.
//!
//! The SEC requires automated traffic to carry a declared contact user agent
//! and tolerates roughly ten requests per second. This crate keeps to that
//! contract: every request sends the caller-supplied user agent, transient
//! failures are retried with a linear backoff, and not-found filings surface
//! as a distinct error so batch callers can skip and continue.

mod client;
mod errors;
mod index;

pub use client::EdgarClient;
pub use errors::Error;
pub use index::{parse_form_index, FilingRef};
