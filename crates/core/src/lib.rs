//! `revboard-core`: Revenue aggregation pipeline for a two-account dashboard.
//!
//! Pure engine crate: receives pre-fetched balance transactions and a
//! historical ledger, returns the combined cumulative series plus the
//! today/grand-total/run-rate summaries. No CLI, network, or file IO.

pub mod aggregate;
pub mod arr;
pub mod classify;
pub mod config;
pub mod error;
pub mod ledger;
pub mod model;
pub mod report;
pub mod snapshot;
pub mod timezone;

pub use config::ReportConfig;
pub use error::ReportError;
pub use ledger::HistoricalLedger;
pub use model::{AccountingCategory, Amount, DayKey, LedgerEntry, RawTransaction};
pub use report::{compute_revenue_report, AccountBatch, RevenueReport};
