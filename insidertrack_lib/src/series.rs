//! Daily close-price series for one ticker.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Ordered (session date, close price) series for one ticker.
///
/// Contiguous only over actually-traded sessions: gaps on weekends and
/// holidays are expected and are not data-quality gaps. Lookups are exact;
/// callers resolve dates through the trading calendar first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    closes: BTreeMap<NaiveDate, f64>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            closes: BTreeMap::new(),
        }
    }

    /// Builds a series from unordered (date, close) pairs. Non-finite and
    /// non-positive closes are dropped: a price of zero is a provider
    /// artifact, not a quote.
    pub fn from_closes(
        ticker: impl Into<String>,
        closes: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            closes: closes
                .into_iter()
                .filter(|(_, c)| c.is_finite() && *c > 0.0)
                .collect(),
        }
    }

    /// Close price on exactly `date`, if that session is present.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.closes.get(&date).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    /// First and last session in the series.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = *self.closes.keys().next()?;
        let last = *self.closes.keys().next_back()?;
        Some((first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn exact_lookup() {
        let series = PriceSeries::from_closes("EXPH", [(d(2025, 3, 3), 10.0), (d(2025, 3, 4), 10.5)]);
        assert_eq!(series.close_on(d(2025, 3, 3)), Some(10.0));
        assert_eq!(series.close_on(d(2025, 3, 5)), None);
    }

    #[test]
    fn missing_date_is_none_not_zero() {
        let series = PriceSeries::from_closes("EXPH", [(d(2025, 3, 3), 10.0)]);
        assert_eq!(series.close_on(d(2025, 3, 1)), None);
    }

    #[test]
    fn zero_and_nan_closes_dropped() {
        let series = PriceSeries::from_closes(
            "EXPH",
            [
                (d(2025, 3, 3), 0.0),
                (d(2025, 3, 4), f64::NAN),
                (d(2025, 3, 5), -1.0),
                (d(2025, 3, 6), 9.75),
            ],
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series.close_on(d(2025, 3, 6)), Some(9.75));
    }

    #[test]
    fn span_covers_first_and_last() {
        let series = PriceSeries::from_closes(
            "EXPH",
            [(d(2025, 3, 10), 11.0), (d(2025, 3, 3), 10.0), (d(2025, 3, 5), 10.2)],
        );
        assert_eq!(series.span(), Some((d(2025, 3, 3), d(2025, 3, 10))));
    }

    #[test]
    fn empty_series() {
        let series = PriceSeries::new("EXPH");
        assert!(series.is_empty());
        assert_eq!(series.span(), None);
    }
}
