//! Historical ledger CSV.
//!
//! One row per day with the seven [`LEDGER_HEADER`] columns. Columns are
//! located by header name, so extra columns and reordering are tolerated.
//! Amounts are written with exactly 6 decimal places; on read any plain
//! decimal with up to 6 places is accepted (`100`, `100.5`, `100.500000`).

use std::io::{Read, Write};
use std::path::Path;

use csv::StringRecord;
use revboard_core::model::{Amount, DayKey, LedgerEntry, LEDGER_HEADER};
use revboard_core::HistoricalLedger;

use crate::error::IoError;

// ── Read ────────────────────────────────────────────────────────────

/// Parse ledger rows. Ordering is not checked here; see [`HistoricalLedger::new`].
pub fn read_ledger_csv(reader: impl Read) -> Result<Vec<LedgerEntry>, IoError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv.headers()?.clone();
    let mut idx = [0usize; 7];
    for (slot, name) in idx.iter_mut().zip(LEDGER_HEADER) {
        *slot = column_index(&headers, name)?;
    }

    let mut entries = Vec::new();
    for (i, result) in csv.records().enumerate() {
        let row = i + 1;
        let record = result.map_err(|e| IoError::row(row, format!("CSV parse error: {e}")))?;

        let date_str = field(&record, idx[0]);
        let date = DayKey::parse(date_str)
            .ok_or_else(|| IoError::row(row, format!("invalid date '{date_str}'")))?;

        let amount = |col: usize| -> Result<Amount, IoError> {
            let raw = field(&record, idx[col]);
            Amount::parse_decimal(raw).ok_or_else(|| {
                IoError::row(row, format!("invalid {} '{}'", LEDGER_HEADER[col], raw))
            })
        };

        entries.push(LedgerEntry {
            date,
            amount_a: amount(1)?,
            cumulative_a: amount(2)?,
            amount_b: amount(3)?,
            cumulative_b: amount(4)?,
            total_daily: amount(5)?,
            total_cumulative: amount(6)?,
        });
    }

    Ok(entries)
}

/// Load the historical ledger from `path`.
///
/// A missing file yields `Ok(None)` so the pipeline can report it as a
/// missing seed; an empty file (header only) is a valid empty ledger.
pub fn load_historical(path: &Path) -> Result<Option<HistoricalLedger>, IoError> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("historical ledger not found at {}", path.display());
            return Ok(None);
        }
        Err(e) => return Err(IoError::file(path, e)),
    };

    let entries = read_ledger_csv(file)?;
    log::debug!("loaded {} historical rows from {}", entries.len(), path.display());
    Ok(Some(HistoricalLedger::new(entries)?))
}

// ── Write ───────────────────────────────────────────────────────────

/// Write ledger rows in [`LEDGER_HEADER`] order with fixed 6-decimal amounts.
pub fn write_ledger_csv(entries: &[LedgerEntry], writer: impl Write) -> Result<(), IoError> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(LEDGER_HEADER)?;
    for entry in entries {
        csv.write_record(entry.csv_record())?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────

pub(crate) fn column_index(headers: &StringRecord, name: &'static str) -> Result<usize, IoError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or(IoError::MissingColumn(name))
}

pub(crate) fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

// ── Tests ───────────────────────────────────────────────────────────
