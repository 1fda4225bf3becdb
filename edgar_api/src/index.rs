//! Parser for the EDGAR daily form index (`form.YYYYMMDD.idx`).
//!
//! The index is a fixed-width text table preceded by a free-form header.
//! Rows are whitespace-separated with the company name in the middle, so a
//! row is read back-to-front: file name, date filed, CIK, then everything
//! between the form type and the CIK is the company name.

use chrono::NaiveDate;

/// One Form 4 entry from a daily index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingRef {
    /// Accession number derived from the archive file name,
    /// e.g. `0000789012-25-000456`.
    pub accession: String,
    /// Filer CIK as listed in the index.
    pub cik: String,
    /// Company name column (the reporting person for Form 4).
    pub company: String,
    /// Date the filing was received by EDGAR.
    pub date_filed: Option<NaiveDate>,
    /// Archive-relative path, e.g. `edgar/data/789012/0000789012-25-000456.txt`.
    pub path: String,
}

/// Parse a daily form index body, keeping only Form 4 rows in file order.
///
/// Header lines (everything up to and including the dashed separator) are
/// skipped. Rows that do not have enough columns are skipped with a warning
/// rather than failing the whole index.
pub fn parse_form_index(body: &str) -> Vec<FilingRef> {
    let mut refs = Vec::new();
    let mut in_table = false;

    for line in body.lines() {
        if !in_table {
            if line.starts_with("----") || line.contains("Form Type") {
                // The separator line follows the column header; either marks
                // the start of data on real index files.
                in_table = line.starts_with("----");
                continue;
            }
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        // Amendments (4/A) are a different form type and are excluded here.
        if fields[0] != "4" {
            continue;
        }
        if fields.len() < 5 {
            tracing::warn!("Skipping short index row: {:?}", line);
            continue;
        }

        let path = fields[fields.len() - 1].to_string();
        let date_filed = NaiveDate::parse_from_str(fields[fields.len() - 2], "%Y%m%d").ok();
        let cik = fields[fields.len() - 3].to_string();
        let company = fields[1..fields.len() - 3].join(" ");
        let accession = accession_from_path(&path);

        refs.push(FilingRef {
            accession,
            cik,
            company,
            date_filed,
            path,
        });
    }

    refs
}

/// Derive the accession number from an archive path by stripping the
/// directory and the `.txt` extension.
fn accession_from_path(path: &str) -> String {
    path.rsplit('/')
        .next()
        .unwrap_or(path)
        .trim_end_matches(".txt")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_INDEX: &str = "\
Description:           Daily Index of EDGAR Dissemination Feed by Form Type
Last Data Received:    March 3, 2025
Comments:              webmaster@sec.gov

Form Type   Company Name                        CIK         Date Filed  File Name
---------------------------------------------------------------------------------
10-K        ACME MANUFACTURING CORP             0000012345  20250303    edgar/data/12345/0000012345-25-000010.txt
4           SMITH JOHN Q                        0000789012  20250303    edgar/data/789012/0000789012-25-000456.txt
4/A         DOE JANE                            0000555555  20250303    edgar/data/555555/0000555555-25-000001.txt
4           O CONNOR PATRICK                    0000321321  20250303    edgar/data/321321/0000321321-25-000099.txt
8-K         WIDGETS INC                         0000999999  20250303    edgar/data/999999/0000999999-25-000222.txt
";

    #[test]
    fn keeps_only_form_4_rows_in_order() {
        let refs = parse_form_index(SAMPLE_INDEX);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].cik, "0000789012");
        assert_eq!(refs[1].cik, "0000321321");
    }

    #[test]
    fn company_name_with_spaces_preserved() {
        let refs = parse_form_index(SAMPLE_INDEX);
        assert_eq!(refs[0].company, "SMITH JOHN Q");
        assert_eq!(refs[1].company, "O CONNOR PATRICK");
    }

    #[test]
    fn accession_derived_from_path() {
        let refs = parse_form_index(SAMPLE_INDEX);
        assert_eq!(refs[0].accession, "0000789012-25-000456");
        assert_eq!(refs[0].path, "edgar/data/789012/0000789012-25-000456.txt");
    }

    #[test]
    fn date_filed_parsed() {
        let refs = parse_form_index(SAMPLE_INDEX);
        assert_eq!(
            refs[0].date_filed,
            NaiveDate::from_ymd_opt(2025, 3, 3)
        );
    }

    #[test]
    fn amendments_excluded() {
        let refs = parse_form_index(SAMPLE_INDEX);
        assert!(refs.iter().all(|r| r.cik != "0000555555"));
    }

    #[test]
    fn empty_body_yields_empty() {
        assert!(parse_form_index("").is_empty());
    }

    #[test]
    fn header_only_yields_empty() {
        let body = "Form Type   Company Name   CIK   Date Filed   File Name\n----\n";
        assert!(parse_form_index(body).is_empty());
    }

    #[test]
    fn short_rows_skipped() {
        let body = "----\n4 incomplete\n4           FULL NAME    0000000001  20250303    edgar/data/1/acc.txt\n";
        let refs = parse_form_index(body);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].company, "FULL NAME");
    }

    #[test]
    fn invalid_date_left_absent() {
        let body = "----\n4           X Y          0000000001  2025030X    edgar/data/1/acc.txt\n";
        let refs = parse_form_index(body);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].date_filed, None);
    }
}
