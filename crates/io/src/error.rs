use std::path::PathBuf;

use revboard_core::ReportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing column '{0}'")]
    MissingColumn(&'static str),
    /// 1-based data row (header excluded).
    #[error("row {row}: {message}")]
    Row { row: usize, message: String },
    #[error(transparent)]
    Ledger(#[from] ReportError),
}

impl IoError {
    pub(crate) fn row(row: usize, message: impl Into<String>) -> Self {
        Self::Row {
            row,
            message: message.into(),
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}
