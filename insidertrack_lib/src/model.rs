//! Core data model: filings, transactions, and the SEC transaction code set.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One fetched Form 4 filing: archive metadata plus the raw document text.
///
/// Immutable once fetched. The raw text is only needed during extraction;
/// downstream stages carry the metadata on each [`Transaction`].
#[derive(Debug, Clone)]
pub struct Filing {
    /// EDGAR accession number, e.g. `0000789012-25-000456`.
    pub accession: String,
    /// CIK of the filer as listed in the daily index.
    pub cik: String,
    /// Date the filing was received by EDGAR.
    pub date_filed: Option<NaiveDate>,
    /// Archive-relative path the document was fetched from.
    pub source_path: String,
    /// Raw document text (SEC dissemination wrapper around the XML body).
    pub text: String,
}

/// SEC Form 4 transaction codes.
///
/// Unrecognized codes are preserved as [`TransactionCode::Other`] rather than
/// dropped; they are simply never high-signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "char", from = "char")]
pub enum TransactionCode {
    /// P -- open market or private purchase.
    Purchase,
    /// S -- open market or private sale.
    Sale,
    /// V -- transaction voluntarily reported earlier than required.
    VoluntaryReport,
    /// A -- grant, award, or other acquisition.
    Award,
    /// D -- disposition to the issuer.
    DispositionToIssuer,
    /// F -- payment of exercise price or tax liability in shares.
    TaxWithholding,
    /// I -- discretionary transaction.
    Discretionary,
    /// M -- exercise or conversion of a derivative security.
    OptionExercise,
    /// C -- conversion of a derivative security.
    Conversion,
    /// E -- expiration of a short derivative position.
    ExpirationShort,
    /// H -- expiration of a long derivative position.
    ExpirationLong,
    /// O -- exercise of an out-of-the-money derivative.
    ExerciseOutOfMoney,
    /// X -- exercise of an in-the-money or at-the-money derivative.
    ExerciseInMoney,
    /// G -- bona fide gift.
    Gift,
    /// L -- small acquisition under Rule 16a-6.
    SmallAcquisition,
    /// W -- acquisition or disposition by will or the laws of descent.
    Inheritance,
    /// Z -- deposit into or withdrawal from a voting trust.
    VotingTrust,
    /// J -- other acquisition or disposition.
    OtherAcquisition,
    /// K -- equity swap or similar instrument.
    EquitySwap,
    /// U -- disposition pursuant to a tender of shares.
    Tender,
    /// Any code outside the published set, preserved as-is.
    Other(char),
}

impl TransactionCode {
    /// The character the code is reported as on the filing.
    pub fn as_char(self) -> char {
        match self {
            Self::Purchase => 'P',
            Self::Sale => 'S',
            Self::VoluntaryReport => 'V',
            Self::Award => 'A',
            Self::DispositionToIssuer => 'D',
            Self::TaxWithholding => 'F',
            Self::Discretionary => 'I',
            Self::OptionExercise => 'M',
            Self::Conversion => 'C',
            Self::ExpirationShort => 'E',
            Self::ExpirationLong => 'H',
            Self::ExerciseOutOfMoney => 'O',
            Self::ExerciseInMoney => 'X',
            Self::Gift => 'G',
            Self::SmallAcquisition => 'L',
            Self::Inheritance => 'W',
            Self::VotingTrust => 'Z',
            Self::OtherAcquisition => 'J',
            Self::EquitySwap => 'K',
            Self::Tender => 'U',
            Self::Other(c) => c,
        }
    }

    /// Open-market purchases and sales are the only codes worth the cost of
    /// performance enrichment by default.
    pub fn is_high_signal(self) -> bool {
        matches!(self, Self::Purchase | Self::Sale)
    }
}

impl From<char> for TransactionCode {
    fn from(c: char) -> Self {
        match c.to_ascii_uppercase() {
            'P' => Self::Purchase,
            'S' => Self::Sale,
            'V' => Self::VoluntaryReport,
            'A' => Self::Award,
            'D' => Self::DispositionToIssuer,
            'F' => Self::TaxWithholding,
            'I' => Self::Discretionary,
            'M' => Self::OptionExercise,
            'C' => Self::Conversion,
            'E' => Self::ExpirationShort,
            'H' => Self::ExpirationLong,
            'O' => Self::ExerciseOutOfMoney,
            'X' => Self::ExerciseInMoney,
            'G' => Self::Gift,
            'L' => Self::SmallAcquisition,
            'W' => Self::Inheritance,
            'Z' => Self::VotingTrust,
            'J' => Self::OtherAcquisition,
            'K' => Self::EquitySwap,
            'U' => Self::Tender,
            other => Self::Other(other),
        }
    }
}

impl From<TransactionCode> for char {
    fn from(code: TransactionCode) -> char {
        code.as_char()
    }
}

impl std::fmt::Display for TransactionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Which reporting table a transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionTable {
    NonDerivative,
    Derivative,
}

/// Acquired/disposed flag from `transactionAcquiredDisposedCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquiredDisposed {
    Acquired,
    Disposed,
}

impl AcquiredDisposed {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Self::Acquired),
            'D' => Some(Self::Disposed),
            _ => None,
        }
    }
}

/// Direct or indirect ownership from `directOrIndirectOwnership`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    Direct,
    Indirect,
}

impl Ownership {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'D' => Some(Self::Direct),
            'I' => Some(Self::Indirect),
            _ => None,
        }
    }
}

/// One normalized transaction line item from a Form 4.
///
/// Optional fields were either absent on the filing or unparsable; they are
/// never defaulted. One filing yields zero or more transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub owner_name: String,
    pub owner_cik: String,
    pub is_director: bool,
    pub is_officer: bool,
    pub officer_title: Option<String>,
    pub issuer_name: String,
    pub issuer_cik: String,
    pub ticker: Option<String>,
    /// SIC major division description, from the dissemination header.
    pub industry: Option<String>,
    pub security_title: Option<String>,
    pub table: TransactionTable,
    pub date: Option<NaiveDate>,
    pub code: Option<TransactionCode>,
    pub shares: Option<f64>,
    pub price_per_share: Option<f64>,
    pub acquired_disposed: Option<AcquiredDisposed>,
    pub shares_owned_after: Option<f64>,
    pub ownership: Option<Ownership>,
    /// Footnote ids referenced by this line item, in filing order.
    pub footnote_refs: Vec<String>,
}

/// A footnote definition from the filing's footnote block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footnote {
    pub id: String,
    pub text: String,
}
