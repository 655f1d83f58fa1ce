//! Raw balance transaction CSV, as written by `revboard fetch stripe`.
//!
//! Columns: `id,created,available_on,amount_minor,currency,category,status`.
//! Empty or non-integer `created`/`available_on`/`amount_minor` cells read
//! back as missing (the latter with a warning) so the classifier excludes and
//! counts the record. Only structural problems (missing column, broken
//! quoting) fail the file.

use std::io::{Read, Write};
use std::path::Path;

use csv::StringRecord;
use revboard_core::model::{AccountingCategory, RawTransaction};

use crate::error::IoError;
use crate::ledger::{column_index, field};

pub const TRANSACTIONS_HEADER: [&str; 7] = [
    "id",
    "created",
    "available_on",
    "amount_minor",
    "currency",
    "category",
    "status",
];

/// Write transactions sorted by (available_on, id) for deterministic output.
pub fn write_transactions_csv(
    transactions: &[RawTransaction],
    writer: impl Write,
) -> Result<(), IoError> {
    let mut sorted: Vec<&RawTransaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| a.available_on.cmp(&b.available_on).then_with(|| a.id.cmp(&b.id)));

    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(TRANSACTIONS_HEADER)?;
    for tx in sorted {
        csv.write_record([
            tx.id.clone(),
            opt_to_string(tx.created),
            opt_to_string(tx.available_on),
            opt_to_string(tx.amount_minor),
            tx.currency.clone(),
            tx.category.as_str().to_string(),
            tx.status.clone(),
        ])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn read_transactions_csv(reader: impl Read) -> Result<Vec<RawTransaction>, IoError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv.headers()?.clone();
    let id = column_index(&headers, "id")?;
    let created = column_index(&headers, "created")?;
    let available_on = column_index(&headers, "available_on")?;
    let amount_minor = column_index(&headers, "amount_minor")?;
    let currency = column_index(&headers, "currency")?;
    let category = column_index(&headers, "category")?;
    let status = optional_column(&headers, "status");

    let mut out = Vec::new();
    for (i, result) in csv.records().enumerate() {
        let row = i + 1;
        let record = result.map_err(|e| IoError::row(row, format!("CSV parse error: {e}")))?;

        out.push(RawTransaction {
            id: field(&record, id).to_string(),
            created: parse_opt_i64(&record, created, "created", row),
            available_on: parse_opt_i64(&record, available_on, "available_on", row),
            amount_minor: parse_opt_i64(&record, amount_minor, "amount_minor", row),
            currency: field(&record, currency).to_string(),
            category: AccountingCategory::parse(field(&record, category)),
            status: status.map(|s| field(&record, s).to_string()).unwrap_or_default(),
        });
    }
    Ok(out)
}

/// Read a transactions file from disk.
pub fn load_transactions(path: &Path) -> Result<Vec<RawTransaction>, IoError> {
    let file = std::fs::File::open(path).map_err(|e| IoError::file(path, e))?;
    let txs = read_transactions_csv(file)?;
    log::debug!("loaded {} transactions from {}", txs.len(), path.display());
    Ok(txs)
}

fn optional_column(headers: &StringRecord, name: &'static str) -> Option<usize> {
    column_index(headers, name).ok()
}

fn parse_opt_i64(record: &StringRecord, idx: usize, name: &str, row: usize) -> Option<i64> {
    let raw = field(record, idx);
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("row {row}: invalid {name} '{raw}', treated as missing");
            None
        }
    }
}

fn opt_to_string(v: Option<i64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, available_on: Option<i64>, minor: Option<i64>, category: &str) -> RawTransaction {
        RawTransaction {
            id: id.to_string(),
            created: Some(1_749_900_000),
            available_on,
            amount_minor: minor,
            currency: "usd".to_string(),
            category: AccountingCategory::parse(category),
            status: "available".to_string(),
        }
    }

    #[test]
    fn test_write_then_read() {
        let input = vec![
            tx("txn_b", Some(1_750_000_000), Some(1000), "charge"),
            tx("txn_a", Some(1_750_000_000), Some(-500), "refund"),
            tx("txn_c", None, None, "payout"),
        ];
        let mut buf = Vec::new();
        write_transactions_csv(&input, &mut buf).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,created,available_on,amount_minor,currency,category,status");
        // None sorts first, then by id.
        assert_eq!(lines[1], "txn_c,1749900000,,,usd,payout,available");
        assert_eq!(lines[2], "txn_a,1749900000,1750000000,-500,usd,refund,available");

        let back = read_transactions_csv(buf.as_slice()).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back[0].available_on, None);
        assert_eq!(back[1].category, AccountingCategory::Refund);
        assert_eq!(back[2].amount_minor, Some(1000));
    }

    #[test]
    fn test_status_column_optional() {
        let csv = "id,created,available_on,amount_minor,currency,category\nt1,1,2,300,jpy,charge\n";
        let txs = read_transactions_csv(csv.as_bytes()).unwrap();
        assert_eq!(txs[0].status, "");
        assert_eq!(txs[0].currency, "jpy");
    }

    #[test]
    fn test_non_numeric_cells_read_as_missing() {
        let csv = "id,created,available_on,amount_minor,currency,category\n\
                   ok_1,1,2,1000,usd,charge\n\
                   bad_1,1,2,12.50,usd,charge\n\
                   bad_2,x,tomorrow,300,usd,charge\n\
                   ok_2,1,2,2000,usd,charge\n";
        let txs = read_transactions_csv(csv.as_bytes()).unwrap();
        assert_eq!(txs.len(), 4);
        assert_eq!(txs[0].amount_minor, Some(1000));
        assert_eq!(txs[1].id, "bad_1");
        assert_eq!(txs[1].amount_minor, None);
        assert_eq!(txs[2].created, None);
        assert_eq!(txs[2].available_on, None);
        assert_eq!(txs[2].amount_minor, Some(300));
        assert_eq!(txs[3].amount_minor, Some(2000));
    }

    #[test]
    fn test_missing_column_is_error() {
        let csv = "id,created,amount_minor,currency,category\nt1,1,300,usd,charge\n";
        let err = read_transactions_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, IoError::MissingColumn("available_on")), "{err}");
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_transactions(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, IoError::File { .. }));
    }
}
