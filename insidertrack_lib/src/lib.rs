//! Library layer for InsiderTrack: Form 4 extraction, signal filtering, and
//! market-performance enrichment.
//!
//! Provides the ownership-document extractor, a trading-session calendar, a
//! cached Yahoo Finance client, and the enrichment pipeline that turns raw
//! filing text into flat export rows. Transport against EDGAR itself lives in
//! the `edgar_api` crate; this layer only sees the fetched text.

pub mod assemble;
pub mod cache;
pub mod calendar;
pub mod enrich;
pub mod extractor;
pub mod market;
pub mod model;
pub mod series;
pub mod signal;

pub use assemble::{assemble_row, OutputRow, ValidationReport};
pub use cache::FetchCache;
pub use calendar::TradingCalendar;
pub use enrich::{enrich, EnrichError, EnrichedTransaction, Enricher, HorizonMetrics};
pub use extractor::{extract, ExtractError, ParsedFiling};
pub use market::{MarketData, MarketError, YahooClient};
pub use model::{Filing, Footnote, Transaction, TransactionCode, TransactionTable};
pub use series::PriceSeries;
pub use signal::SignalFilter;
