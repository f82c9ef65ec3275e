//! CSV transaction parser
//!
//! Converts decoded CSV text into normalized `TransactionCandidate` records.
//! The source bank-export format is detected from the header row; each format
//! declares its own column mapping and type-vocabulary translation. Rows that
//! fail validation are classified invalid and excluded from persistence
//! without aborting the import.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use florin_common::{Error, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::models::{TransactionCandidate, TransactionType};

/// Supported bank-export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Copilot export: `date, name, amount, status, category, ..., type, account`
    Copilot,
    /// Capital One export: `Transaction Date, Transaction Amount,
    /// Transaction Description, Transaction Type, Account Number`
    CapitalOne,
}

impl SourceFormat {
    /// Detect the source format from lowercased header names
    pub fn detect(headers: &[String]) -> Option<Self> {
        let set: std::collections::HashSet<&str> =
            headers.iter().map(|h| h.as_str()).collect();

        if set.contains("date")
            && set.contains("name")
            && set.contains("amount")
            && set.contains("type")
        {
            return Some(SourceFormat::Copilot);
        }

        if set.contains("transaction date")
            && set.contains("transaction amount")
            && set.contains("transaction description")
        {
            return Some(SourceFormat::CapitalOne);
        }

        None
    }
}

/// One parsed row, in input order
#[derive(Debug, Clone)]
pub enum ParsedRow {
    Valid(TransactionCandidate),
    /// Row excluded from persistence; contributes to the `invalid` counter
    Invalid { line: usize, reason: String },
}

/// Validate CSV structure before processing
///
/// Checks for non-empty content, a header row plus at least one data row,
/// and a recognizable source format. Row-level problems are left to
/// `parse_csv`; this only rejects structurally unusable input.
pub fn validate_csv(content: &str) -> Result<SourceFormat> {
    if content.trim().is_empty() {
        return Err(Error::InvalidInput("CSV content is empty".to_string()));
    }

    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| Error::InvalidInput("CSV header line is empty".to_string()))?;
    if lines.next().is_none() {
        return Err(Error::InvalidInput(
            "CSV must have at least a header row and one data row".to_string(),
        ));
    }

    let headers: Vec<String> = header_line
        .split(',')
        .map(|h| h.trim().trim_matches('"').to_lowercase())
        .collect();

    SourceFormat::detect(&headers).ok_or_else(|| {
        Error::InvalidInput(
            "Unknown CSV format. Supported formats: Copilot, Capital One".to_string(),
        )
    })
}

/// Parse CSV content into an ordered sequence of rows
///
/// Structural failures (unreadable header) are errors; per-row failures
/// yield `ParsedRow::Invalid` so the caller can count them and continue.
pub fn parse_csv(content: &str) -> Result<Vec<ParsedRow>> {
    let format = validate_csv(content)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::InvalidInput(format!("Failed to read CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();

    let mut rows = Vec::new();
    // Line 1 is the header; data starts at line 2
    for (offset, record) in reader.records().enumerate() {
        let line = offset + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                rows.push(ParsedRow::Invalid {
                    line,
                    reason: format!("Unreadable CSV row: {}", e),
                });
                continue;
            }
        };

        match parse_row(format, &index, &record) {
            Ok(candidate) => rows.push(ParsedRow::Valid(candidate)),
            Err(reason) => rows.push(ParsedRow::Invalid { line, reason }),
        }
    }

    Ok(rows)
}

fn parse_row(
    format: SourceFormat,
    index: &HashMap<&str, usize>,
    record: &csv::StringRecord,
) -> std::result::Result<TransactionCandidate, String> {
    let field = |name: &str| -> Option<&str> {
        index
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let raw: Vec<(String, String)> = index
        .iter()
        .filter_map(|(name, &i)| {
            record
                .get(i)
                .map(|v| (name.to_string(), v.trim().to_string()))
        })
        .collect();

    match format {
        SourceFormat::Copilot => {
            let date = parse_date(field("date").ok_or("Missing date")?)?;
            let description = field("name").ok_or("Missing description")?.to_string();
            let amount = parse_amount(field("amount").ok_or("Missing amount")?)?;
            let tx_type = copilot_type(field("type").ok_or("Missing type")?)?;
            let category = field("category").map(str::to_string);
            let account_name = field("account")
                .map(str::to_string)
                .unwrap_or_else(|| "Unknown".to_string());

            Ok(TransactionCandidate {
                date,
                description,
                amount: TransactionCandidate::normalize_sign(amount, tx_type),
                tx_type,
                category,
                account_name,
                raw,
            })
        }
        SourceFormat::CapitalOne => {
            let date = parse_date(field("transaction date").ok_or("Missing date")?)?;
            let description = field("transaction description")
                .ok_or("Missing description")?
                .to_string();
            let amount = parse_amount(field("transaction amount").ok_or("Missing amount")?)?;
            let tx_type = field("transaction type")
                .and_then(TransactionType::parse)
                // Capital One marks direction by amount sign when type is absent
                .unwrap_or(if amount.is_sign_negative() {
                    TransactionType::Expense
                } else {
                    TransactionType::Income
                });
            let account_name = match field("account number") {
                Some(number) => format!("Capital One {}", number),
                None => "Capital One".to_string(),
            };

            Ok(TransactionCandidate {
                date,
                description,
                amount: TransactionCandidate::normalize_sign(amount, tx_type),
                tx_type,
                category: None,
                account_name,
                raw,
            })
        }
    }
}

/// Copilot type vocabulary → canonical set
fn copilot_type(s: &str) -> std::result::Result<TransactionType, String> {
    match s.to_ascii_lowercase().as_str() {
        "income" => Ok(TransactionType::Income),
        "regular" => Ok(TransactionType::Expense),
        "internal transfer" | "transfer" => Ok(TransactionType::Transfer),
        other => Err(format!("Unknown transaction type '{}'", other)),
    }
}

/// Parse a date in any of the accepted source formats
fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    const FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%Y/%m/%d", "%d-%m-%Y"];
    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date);
        }
    }
    Err(format!("Unparseable date '{}'", s))
}

/// Parse a decimal amount, tolerating currency symbols, thousands separators,
/// and accounting-style parentheses for negatives
fn parse_amount(s: &str) -> std::result::Result<Decimal, String> {
    let trimmed = s.trim();
    let (negated, trimmed) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (true, &trimmed[1..trimmed.len() - 1])
    } else {
        (false, trimmed)
    };

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ','))
        .collect();

    let amount: Decimal = cleaned
        .trim()
        .parse()
        .map_err(|_| format!("Unparseable amount '{}'", s))?;
    Ok(if negated { -amount } else { amount })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COPILOT_CSV: &str = "\
date,name,amount,status,category,type,account
2024-01-05,Blue Bottle Coffee,4.50,posted,Restaurants,regular,Checking
2024-01-06,Payroll,2500.00,posted,Income,income,Checking
2024-01-07,Savings move,100.00,posted,,internal transfer,Checking
";

    const CAPITAL_ONE_CSV: &str = "\
Transaction Date,Transaction Amount,Transaction Description,Transaction Type,Account Number
01/05/2024,-12.99,NETFLIX.COM,Debit,1234
01/06/2024,1500.00,DIRECT DEPOSIT,Credit,1234
";

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn detects_copilot_format() {
        assert_eq!(validate_csv(COPILOT_CSV).unwrap(), SourceFormat::Copilot);
    }

    #[test]
    fn detects_capital_one_format() {
        assert_eq!(
            validate_csv(CAPITAL_ONE_CSV).unwrap(),
            SourceFormat::CapitalOne
        );
    }

    #[test]
    fn rejects_unknown_format() {
        let err = validate_csv("foo,bar\n1,2\n").unwrap_err();
        assert!(err.to_string().contains("Unknown CSV format"));
    }

    #[test]
    fn rejects_header_only_input() {
        assert!(validate_csv("date,name,amount,type\n").is_err());
        assert!(validate_csv("").is_err());
    }

    #[test]
    fn copilot_rows_parse_with_normalized_signs() {
        let rows = parse_csv(COPILOT_CSV).unwrap();
        assert_eq!(rows.len(), 3);

        let candidates: Vec<_> = rows
            .iter()
            .map(|r| match r {
                ParsedRow::Valid(c) => c,
                ParsedRow::Invalid { line, reason } => {
                    panic!("line {} invalid: {}", line, reason)
                }
            })
            .collect();

        // Expense: positive source amount becomes non-positive
        assert_eq!(candidates[0].tx_type, TransactionType::Expense);
        assert_eq!(candidates[0].amount, dec("-4.50"));
        assert_eq!(candidates[0].category.as_deref(), Some("Restaurants"));

        // Income stays non-negative
        assert_eq!(candidates[1].tx_type, TransactionType::Income);
        assert_eq!(candidates[1].amount, dec("2500.00"));

        // Transfer normalized to non-positive
        assert_eq!(candidates[2].tx_type, TransactionType::Transfer);
        assert_eq!(candidates[2].amount, dec("-100.00"));
        assert!(candidates[2].category.is_none());
    }

    #[test]
    fn capital_one_rows_parse() {
        let rows = parse_csv(CAPITAL_ONE_CSV).unwrap();
        let candidates: Vec<_> = rows
            .iter()
            .filter_map(|r| match r {
                ParsedRow::Valid(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].tx_type, TransactionType::Expense);
        assert_eq!(candidates[0].amount, dec("-12.99"));
        assert_eq!(candidates[0].account_name, "Capital One 1234");
        assert_eq!(candidates[0].date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());

        assert_eq!(candidates[1].tx_type, TransactionType::Income);
        assert_eq!(candidates[1].amount, dec("1500.00"));
    }

    #[test]
    fn invalid_rows_are_classified_not_fatal() {
        let csv = "\
date,name,amount,status,category,type,account
2024-01-05,Coffee,not-a-number,posted,Food,regular,Checking
bad-date,Groceries,12.00,posted,Food,regular,Checking
2024-01-07,,5.00,posted,Food,regular,Checking
2024-01-08,Valid Row,5.00,posted,Food,regular,Checking
";
        let rows = parse_csv(csv).unwrap();
        assert_eq!(rows.len(), 4);

        assert!(matches!(rows[0], ParsedRow::Invalid { line: 2, .. }));
        assert!(matches!(rows[1], ParsedRow::Invalid { line: 3, .. }));
        assert!(matches!(rows[2], ParsedRow::Invalid { line: 4, .. }));
        assert!(matches!(rows[3], ParsedRow::Valid(_)));
    }

    #[test]
    fn row_order_is_preserved() {
        let rows = parse_csv(COPILOT_CSV).unwrap();
        let names: Vec<_> = rows
            .iter()
            .filter_map(|r| match r {
                ParsedRow::Valid(c) => Some(c.description.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, ["Blue Bottle Coffee", "Payroll", "Savings move"]);
    }

    #[test]
    fn amount_parsing_tolerates_currency_noise() {
        assert_eq!(parse_amount("$1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(parse_amount("(42.00)").unwrap(), dec("-42.00"));
        assert!(parse_amount("12.34.56").is_err());
    }

    #[test]
    fn date_parsing_accepts_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(parse_date("2024-01-05").unwrap(), expected);
        assert_eq!(parse_date("01/05/2024").unwrap(), expected);
        assert_eq!(parse_date("2024/01/05").unwrap(), expected);
        assert!(parse_date("Jan five").is_err());
    }

    #[test]
    fn raw_source_fields_are_retained() {
        let rows = parse_csv(COPILOT_CSV).unwrap();
        let ParsedRow::Valid(candidate) = &rows[0] else {
            panic!("expected valid row");
        };
        assert!(candidate
            .raw
            .iter()
            .any(|(k, v)| k == "status" && v == "posted"));
    }
}
