//! Form 4 transaction extractor.
//!
//! A Form 4 filing as disseminated by EDGAR is a plain-text wrapper (the
//! SEC header) around an XML ownership document. Real filings are messy:
//! optional elements, `<value>` wrappers that come and go by filer software,
//! thousands separators in numerics, dangling footnote references. The
//! extractor therefore treats every field as an independent extraction
//! attempt that yields either a value or an explicit absence, and reserves
//! hard failure for documents with no recognizable ownership structure.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

use crate::model::{
    AcquiredDisposed, Footnote, Ownership, Transaction, TransactionCode, TransactionTable,
};

/// Hard failures: the filing has no usable ownership document at all.
/// Everything less severe degrades to warnings on a partial result.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("No ownership document found in filing text")]
    NoOwnershipDocument,
    #[error("Ownership document is unparsable: {0}")]
    MalformedDocument(String),
}

/// Result of extracting one filing: transactions in filing order, the
/// footnote definition block, and row-level warnings for fields that could
/// not be parsed. Zero transactions is a valid outcome, not an error.
#[derive(Debug, Default)]
pub struct ParsedFiling {
    pub transactions: Vec<Transaction>,
    pub footnotes: BTreeMap<String, Footnote>,
    pub warnings: Vec<String>,
}

impl ParsedFiling {
    /// Joins the footnote texts referenced by a transaction, in reference
    /// order. References without a definition are kept as the literal id.
    pub fn footnote_text(&self, tx: &Transaction) -> String {
        tx.footnote_refs
            .iter()
            .map(|id| {
                self.footnotes
                    .get(id)
                    .map(|f| f.text.as_str())
                    .unwrap_or(id.as_str())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Maps the first digit of a 4-digit SIC code to its major division.
fn sic_division(code: &str) -> Option<&'static str> {
    match code.chars().next()? {
        '0' => Some("Agriculture, Forestry, & Fishing"),
        '1' => Some("Mining & Construction"),
        '2' | '3' => Some("Manufacturing"),
        '4' => Some("Transportation, Communications, & Utilities"),
        '5' => Some("Wholesale & Retail Trade"),
        '6' => Some("Finance, Insurance, & Real Estate"),
        '7' | '8' => Some("Services"),
        '9' => Some("Public Administration"),
        _ => None,
    }
}

/// Pulls the SIC industry description out of the dissemination header.
/// The header line reads e.g.
/// `STANDARD INDUSTRIAL CLASSIFICATION: PHARMACEUTICAL PREPARATIONS [2834]`.
fn header_industry(text: &str) -> Option<String> {
    let re = Regex::new(r"STANDARD INDUSTRIAL CLASSIFICATION:\s*.*\[(\d{4})\]").ok()?;
    let code = re.captures(text)?.get(1)?.as_str();
    sic_division(code).map(str::to_string)
}

/// Locates the XML ownership document inside the filing text. EDGAR wraps it
/// in literal `<XML>`/`</XML>` markers; some sources hand over the bare XML.
fn locate_xml(text: &str) -> Option<&str> {
    if let Some(start) = text.find("<XML>") {
        let inner = &text[start + "<XML>".len()..];
        let end = inner.find("</XML>").unwrap_or(inner.len());
        return Some(inner[..end].trim());
    }
    if let Some(start) = text.find("<?xml") {
        return Some(text[start..].trim());
    }
    if text.contains("<ownershipDocument") {
        return Some(text.trim());
    }
    None
}

/// Strips separators and currency noise, then parses a float.
/// Returns `None` for empty or non-numeric input; callers decide whether
/// that deserves a warning.
fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Document-level fields shared by every transaction row. Only the first
/// reporting owner is kept when a filing lists several.
#[derive(Debug, Default)]
struct DocHeader {
    owner_name: String,
    owner_cik: String,
    is_director: bool,
    is_officer: bool,
    officer_title: Option<String>,
    issuer_name: String,
    issuer_cik: String,
    ticker: Option<String>,
}

impl DocHeader {
    fn is_empty(&self) -> bool {
        self.owner_cik.is_empty() && self.issuer_cik.is_empty() && self.issuer_name.is_empty()
    }
}

/// Raw field captures for one transaction row; parsed on `finish`.
#[derive(Debug, Default)]
struct RowBuilder {
    table: Option<TransactionTable>,
    security_title: Option<String>,
    date_raw: Option<String>,
    code_raw: Option<String>,
    shares_raw: Option<String>,
    price_raw: Option<String>,
    acquired_disposed_raw: Option<String>,
    owned_after_raw: Option<String>,
    ownership_raw: Option<String>,
    footnote_refs: Vec<String>,
}

impl RowBuilder {
    fn new(table: TransactionTable) -> Self {
        Self {
            table: Some(table),
            ..Self::default()
        }
    }

    fn finish(
        self,
        header: &DocHeader,
        industry: &Option<String>,
        row: usize,
        warnings: &mut Vec<String>,
    ) -> Transaction {
        let mut warn = |field: &str, raw: &str| {
            warnings.push(format!("row {}: unparsable {} '{}'", row, field, raw));
        };

        let date = self.date_raw.as_deref().and_then(|raw| {
            let day = raw.get(..10).unwrap_or(raw);
            match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(_) => {
                    warn("transaction date", raw);
                    None
                }
            }
        });

        let code = self
            .code_raw
            .as_deref()
            .and_then(|raw| raw.trim().chars().next())
            .map(TransactionCode::from);

        let mut numeric = |field: &str, raw: &Option<String>| -> Option<f64> {
            let raw = raw.as_deref()?;
            match parse_numeric(raw) {
                Some(v) => Some(v),
                None => {
                    warn(field, raw);
                    None
                }
            }
        };
        let shares = numeric("shares", &self.shares_raw);
        let price_per_share = numeric("price per share", &self.price_raw);
        let shares_owned_after = numeric("shares owned after", &self.owned_after_raw);

        let acquired_disposed = self
            .acquired_disposed_raw
            .as_deref()
            .and_then(|raw| raw.trim().chars().next())
            .and_then(AcquiredDisposed::from_char);
        let ownership = self
            .ownership_raw
            .as_deref()
            .and_then(|raw| raw.trim().chars().next())
            .and_then(Ownership::from_char);

        Transaction {
            owner_name: header.owner_name.clone(),
            owner_cik: header.owner_cik.clone(),
            is_director: header.is_director,
            is_officer: header.is_officer,
            officer_title: header.officer_title.clone(),
            issuer_name: header.issuer_name.clone(),
            issuer_cik: header.issuer_cik.clone(),
            ticker: header.ticker.clone(),
            industry: industry.clone(),
            security_title: self.security_title,
            table: self.table.unwrap_or(TransactionTable::NonDerivative),
            date,
            code,
            shares,
            price_per_share,
            acquired_disposed,
            shares_owned_after,
            ownership,
            footnote_refs: self.footnote_refs,
        }
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn footnote_id_attr(e: &BytesStart<'_>) -> Option<String> {
    e.try_get_attribute("id")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Extracts all transaction rows and footnotes from one filing's raw text.
///
/// Tolerant: unparsable fields are left unset with a warning, rows
/// that parse survive rows that do not, and an XML stream that breaks after
/// yielding data produces a partial result. Only a filing with no locatable
/// or minimally-parsable ownership document is an error.
pub fn extract(filing_text: &str) -> Result<ParsedFiling, ExtractError> {
    let xml = locate_xml(filing_text).ok_or(ExtractError::NoOwnershipDocument)?;
    let industry = header_industry(filing_text);

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = ParsedFiling::default();
    let mut header = DocHeader::default();
    let mut path: Vec<String> = Vec::new();
    let mut row: Option<RowBuilder> = None;
    let mut footnote: Option<Footnote> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(&e);
                match name.as_str() {
                    "ownershipDocument" => saw_root = true,
                    "nonDerivativeTransaction" => {
                        row = Some(RowBuilder::new(TransactionTable::NonDerivative));
                    }
                    "derivativeTransaction" => {
                        row = Some(RowBuilder::new(TransactionTable::Derivative));
                    }
                    "footnote" => {
                        if let Some(id) = footnote_id_attr(&e) {
                            footnote = Some(Footnote {
                                id,
                                text: String::new(),
                            });
                        }
                    }
                    "footnoteId" => {
                        if let (Some(builder), Some(id)) = (row.as_mut(), footnote_id_attr(&e)) {
                            builder.footnote_refs.push(id);
                        }
                    }
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(&e);
                if name == "footnoteId" {
                    if let (Some(builder), Some(id)) = (row.as_mut(), footnote_id_attr(&e)) {
                        builder.footnote_refs.push(id);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = match t.unescape() {
                    Ok(v) => v.into_owned(),
                    Err(_) => continue,
                };
                if let Some(f) = footnote.as_mut() {
                    if !f.text.is_empty() {
                        f.text.push(' ');
                    }
                    f.text.push_str(text.trim());
                    continue;
                }
                assign_field(&path, text, &mut header, &mut row);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "nonDerivativeTransaction" | "derivativeTransaction" => {
                        if let Some(builder) = row.take() {
                            let idx = parsed.transactions.len() + 1;
                            parsed.transactions.push(builder.finish(
                                &header,
                                &industry,
                                idx,
                                &mut parsed.warnings,
                            ));
                        }
                    }
                    "footnote" => {
                        if let Some(f) = footnote.take() {
                            parsed.footnotes.insert(f.id.clone(), f);
                        }
                    }
                    _ => {}
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                // A stream that breaks before yielding anything usable means
                // the document structure itself is absent.
                if parsed.transactions.is_empty()
                    && parsed.footnotes.is_empty()
                    && header.is_empty()
                {
                    return Err(ExtractError::MalformedDocument(e.to_string()));
                }
                parsed
                    .warnings
                    .push(format!("XML stream aborted, result is partial: {}", e));
                break;
            }
            Ok(_) => {}
        }
    }

    if !saw_root {
        return Err(ExtractError::MalformedDocument(
            "no ownershipDocument root element".to_string(),
        ));
    }

    Ok(parsed)
}

/// Routes a text node to its field based on the element path. Filer software
/// is inconsistent about the `<value>` wrapper, so the field name is the
/// nearest non-`value` ancestor.
fn assign_field(
    path: &[String],
    text: String,
    header: &mut DocHeader,
    row: &mut Option<RowBuilder>,
) {
    let mut parts = path.iter().rev();
    let mut field = match parts.next() {
        Some(name) => name.as_str(),
        None => return,
    };
    if field == "value" {
        field = match parts.next() {
            Some(name) => name.as_str(),
            None => return,
        };
    }

    if let Some(builder) = row.as_mut() {
        let slot = match field {
            "securityTitle" => &mut builder.security_title,
            "transactionDate" => &mut builder.date_raw,
            "transactionCode" => &mut builder.code_raw,
            "transactionShares" => &mut builder.shares_raw,
            "transactionPricePerShare" => &mut builder.price_raw,
            "transactionAcquiredDisposedCode" => &mut builder.acquired_disposed_raw,
            "sharesOwnedFollowingTransaction" => &mut builder.owned_after_raw,
            "directOrIndirectOwnership" => &mut builder.ownership_raw,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(text);
        }
        return;
    }

    // First reporting owner wins when a filing lists several.
    match field {
        "rptOwnerName" if header.owner_name.is_empty() => header.owner_name = text,
        "rptOwnerCik" if header.owner_cik.is_empty() => header.owner_cik = text,
        "isDirector" => header.is_director |= text == "1" || text.eq_ignore_ascii_case("true"),
        "isOfficer" => header.is_officer |= text == "1" || text.eq_ignore_ascii_case("true"),
        "officerTitle" => {
            if header.officer_title.is_none() && !text.is_empty() {
                header.officer_title = Some(text);
            }
        }
        "issuerName" if header.issuer_name.is_empty() => header.issuer_name = text,
        "issuerCik" if header.issuer_cik.is_empty() => header.issuer_cik = text,
        "issuerTradingSymbol" => {
            if header.ticker.is_none() && !text.is_empty() {
                header.ticker = Some(text);
            }
        }
        _ => {}
    }
}
