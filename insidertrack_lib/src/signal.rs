//! High-signal transaction filtering.
//!
//! Enrichment is the expensive stage, so everything downstream of the
//! extractor only ever sees transactions that pass this filter. The default
//! policy keeps open-market purchases and sales from the non-derivative
//! table; both the code set and the derivative policy are caller choices.

use std::collections::HashSet;

use crate::model::{Transaction, TransactionCode, TransactionTable};

/// Pure, order-preserving filter over extracted transactions.
#[derive(Debug, Clone)]
pub struct SignalFilter {
    codes: HashSet<TransactionCode>,
    include_derivative: bool,
}

impl Default for SignalFilter {
    /// Purchases and sales only, non-derivative table only.
    fn default() -> Self {
        Self {
            codes: [TransactionCode::Purchase, TransactionCode::Sale]
                .into_iter()
                .collect(),
            include_derivative: false,
        }
    }
}

impl SignalFilter {
    /// Builds a filter accepting an explicit code set.
    pub fn with_codes(codes: impl IntoIterator<Item = TransactionCode>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Also accept rows from the derivative transaction table.
    pub fn include_derivative(mut self, include: bool) -> Self {
        self.include_derivative = include;
        self
    }

    /// Whether a single transaction passes the filter. Transactions with no
    /// recognizable code never pass.
    pub fn accepts(&self, tx: &Transaction) -> bool {
        if !self.include_derivative && tx.table == TransactionTable::Derivative {
            return false;
        }
        match tx.code {
            Some(code) => self.codes.contains(&code),
            None => false,
        }
    }

    /// Returns the accepted subsequence, preserving input order.
    pub fn filter(&self, transactions: Vec<Transaction>) -> Vec<Transaction> {
        transactions
            .into_iter()
            .filter(|tx| self.accepts(tx))
            .collect()
    }
}
