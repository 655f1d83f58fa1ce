// File I/O for the revenue pipeline: historical ledger and raw transaction CSVs

pub mod error;
pub mod ledger;
pub mod transactions;

pub use error::IoError;
pub use ledger::{load_historical, read_ledger_csv, write_ledger_csv};
pub use transactions::{load_transactions, read_transactions_csv, write_transactions_csv};
