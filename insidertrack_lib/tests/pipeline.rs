//! End-to-end pipeline test: raw filing text through extraction, signal
//! filtering, enrichment with a stub market-data provider, and row assembly.

use chrono::{Duration, NaiveDate};
use insidertrack_lib::assemble::{assemble_row, ValidationReport};
use insidertrack_lib::calendar::{is_session, TradingCalendar};
use insidertrack_lib::enrich::Enricher;
use insidertrack_lib::extractor::extract;
use insidertrack_lib::market::{MarketData, MarketError};
use insidertrack_lib::model::Filing;
use insidertrack_lib::series::PriceSeries;
use insidertrack_lib::signal::SignalFilter;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Serves a flat $10 series for EXPH with an $11 close thirty sessions after
/// 2025-03-03, a flat benchmark, and nothing for any other ticker.
struct StubProvider {
    spike_at: NaiveDate,
}

impl MarketData for StubProvider {
    async fn price_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, MarketError> {
        let (base, spike) = match ticker {
            "EXPH" => (10.0, 11.0),
            "SPY" => (500.0, 500.0),
            other => return Err(MarketError::TickerNotFound(other.to_string())),
        };
        let mut closes = Vec::new();
        let mut day = start;
        while day <= end {
            if is_session(day) {
                let close = if day == self.spike_at { spike } else { base };
                closes.push((day, close));
            }
            day += Duration::days(1);
        }
        Ok(PriceSeries::from_closes(ticker, closes))
    }

    async fn shares_outstanding(&self, ticker: &str) -> Result<f64, MarketError> {
        match ticker {
            "EXPH" => Ok(50_000_000.0),
            other => Err(MarketError::TickerNotFound(other.to_string())),
        }
    }
}

fn form4_text(ticker: &str) -> String {
    format!(
        "SECURITIES AND EXCHANGE COMMISSION\n\
         STANDARD INDUSTRIAL CLASSIFICATION: PHARMACEUTICAL PREPARATIONS [2834]\n\
         <XML>\n\
         <?xml version=\"1.0\"?>\n\
         <ownershipDocument>\n\
           <issuer>\n\
             <issuerCik>0001318605</issuerCik>\n\
             <issuerName>EXAMPLE PHARMA INC</issuerName>\n\
             <issuerTradingSymbol>{ticker}</issuerTradingSymbol>\n\
           </issuer>\n\
           <reportingOwner>\n\
             <reportingOwnerId>\n\
               <rptOwnerCik>0001494730</rptOwnerCik>\n\
               <rptOwnerName>SMITH JOHN Q</rptOwnerName>\n\
             </reportingOwnerId>\n\
             <reportingOwnerRelationship><isDirector>1</isDirector></reportingOwnerRelationship>\n\
           </reportingOwner>\n\
           <nonDerivativeTable>\n\
             <nonDerivativeTransaction>\n\
               <securityTitle><value>Common Stock</value></securityTitle>\n\
               <transactionDate><value>2025-03-03</value></transactionDate>\n\
               <transactionCoding><transactionCode>P</transactionCode></transactionCoding>\n\
               <transactionAmounts>\n\
                 <transactionShares><value>1,000</value></transactionShares>\n\
                 <transactionPricePerShare><value>10.00</value><footnoteId id=\"F1\"/></transactionPricePerShare>\n\
                 <transactionAcquiredDisposedCode><value>A</value></transactionAcquiredDisposedCode>\n\
               </transactionAmounts>\n\
             </nonDerivativeTransaction>\n\
           </nonDerivativeTable>\n\
           <derivativeTable>\n\
             <derivativeTransaction>\n\
               <transactionDate><value>2025-03-03</value></transactionDate>\n\
               <transactionCoding><transactionCode>M</transactionCode></transactionCoding>\n\
               <transactionAmounts><transactionShares><value>2000</value></transactionShares></transactionAmounts>\n\
             </derivativeTransaction>\n\
           </derivativeTable>\n\
           <footnotes>\n\
             <footnote id=\"F1\">Weighted average purchase price.</footnote>\n\
           </footnotes>\n\
         </ownershipDocument>\n\
         </XML>\n"
    )
}

fn filing(ticker: &str) -> Filing {
    Filing {
        accession: "0000789012-25-000456".to_string(),
        cik: "789012".to_string(),
        date_filed: Some(d(2025, 3, 4)),
        source_path: "edgar/data/789012/0000789012-25-000456.txt".to_string(),
        text: form4_text(ticker),
    }
}

#[tokio::test]
async fn filing_to_enriched_row() {
    let filing = filing("EXPH");
    let parsed = extract(&filing.text).unwrap();
    assert_eq!(parsed.transactions.len(), 2);

    // Default filter keeps the open-market purchase, drops the exercise.
    let high_signal = SignalFilter::default().filter(parsed.transactions.clone());
    assert_eq!(high_signal.len(), 1);

    let calendar = TradingCalendar::new(d(2020, 1, 2), d(2030, 12, 31));
    let trade = d(2025, 3, 3);
    let spike_at = calendar.offset(trade, 30).unwrap();
    let enricher = Enricher::new(StubProvider { spike_at }, calendar, "SPY", trade, trade);

    let enriched = enricher.enrich(&high_signal[0]).await.unwrap();
    assert_eq!(enriched.price_on_trade_date, Some(10.0));
    assert_eq!(enriched.trade_value, Some(10_000.0));
    assert_eq!(enriched.market_cap, Some(500_000_000.0));
    assert!((enriched.after.h30.stock_return.unwrap() - 0.10).abs() < 1e-12);
    assert_eq!(enriched.after.h30.benchmark_return, Some(0.0));
    assert!((enriched.after.h30.alpha.unwrap() - 0.10).abs() < 1e-12);

    let footnotes = parsed.footnote_text(&enriched.transaction);
    let row = assemble_row(&enriched, footnotes, &filing);
    assert_eq!(row.owner_name, "SMITH JOHN Q");
    assert_eq!(row.industry.as_deref(), Some("Manufacturing"));
    assert_eq!(row.footnotes, "Weighted average purchase price.");
    assert_eq!(row.transaction_code, Some('P'));
    assert!((row.alpha_30d_after.unwrap() - 0.10).abs() < 1e-12);
    assert_eq!(
        row.filing_url,
        "https://www.sec.gov/Archives/edgar/data/789012/0000789012-25-000456.txt"
    );

    let report = ValidationReport::from_rows(std::slice::from_ref(&row), d(2025, 8, 1));
    assert_eq!(report.rows_total, 1);
    assert_eq!(report.unenriched, 0);
    assert_eq!(report.suspect_alpha, 0);
}

#[tokio::test]
async fn unknown_ticker_survives_unenriched() {
    let filing = filing("GONE");
    let parsed = extract(&filing.text).unwrap();
    let high_signal = SignalFilter::default().filter(parsed.transactions.clone());

    let calendar = TradingCalendar::new(d(2020, 1, 2), d(2030, 12, 31));
    let trade = d(2025, 3, 3);
    let enricher = Enricher::new(
        StubProvider {
            spike_at: d(2025, 4, 14),
        },
        calendar,
        "SPY",
        trade,
        trade,
    );

    let enriched = enricher.enrich(&high_signal[0]).await.unwrap();
    assert_eq!(enriched.price_on_trade_date, None);
    assert_eq!(enriched.market_cap, None);
    assert_eq!(enriched.after.h30.alpha, None);
    // The transaction itself is intact.
    assert_eq!(enriched.transaction.shares, Some(1000.0));
    assert_eq!(enriched.trade_value, Some(10_000.0));

    let footnotes = parsed.footnote_text(&enriched.transaction);
    let row = assemble_row(&enriched, footnotes, &filing);
    let report = ValidationReport::from_rows(std::slice::from_ref(&row), d(2025, 8, 1));
    assert_eq!(report.unenriched, 1);
    assert_eq!(report.enrichment_rate(), 0.0);
}
