use thiserror::Error;

/// Errors that fail a whole report run.
///
/// Per-record problems (bad currency, missing timestamp, unknown category)
/// never surface here; they are counted in `BatchDiagnostics` instead.
#[derive(Debug, Error)]
pub enum ReportError {
    /// No historical ledger was supplied. Without a seed there is no valid
    /// cumulative baseline.
    #[error("historical ledger is missing: cannot seed cumulative totals")]
    MissingHistorical,
    /// Historical ledger rows are out of order or duplicated.
    #[error("invalid historical ledger: {0}")]
    InvalidHistorical(String),
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad timezone name, zero page cap, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
}
