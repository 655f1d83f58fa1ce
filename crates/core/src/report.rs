//! Pipeline entry point: classify → aggregate → merge → snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{aggregate, DailySeries};
use crate::arr::{annual_run_rate, RunRate};
use crate::classify::{ClassifyStats, Classifier};
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::ledger::{merge, HistoricalLedger};
use crate::model::{DayKey, LedgerEntry, RawTransaction};
use crate::snapshot::{select_snapshot, GrandTotals, TodaySnapshot};
use crate::timezone::DayNormalizer;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One account's transactions as handed over by the transport.
#[derive(Debug, Clone)]
pub enum AccountBatch {
    /// Records received. `partial` is set when the transport stopped early
    /// (page cap, timeout) and returned what it had.
    Fetched {
        transactions: Vec<RawTransaction>,
        partial: bool,
    },
    /// The source failed entirely; the account contributes nothing.
    Failed { reason: String },
}

impl AccountBatch {
    pub fn complete(transactions: Vec<RawTransaction>) -> Self {
        Self::Fetched {
            transactions,
            partial: false,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    fn transactions(&self) -> &[RawTransaction] {
        match self {
            Self::Fetched { transactions, .. } => transactions,
            Self::Failed { .. } => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Non-fatal flags and counters for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchDiagnostics {
    pub source_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub partial: bool,
    #[serde(flatten)]
    pub stats: ClassifyStats,
}

impl BatchDiagnostics {
    fn new(batch: &AccountBatch, stats: ClassifyStats) -> Self {
        match batch {
            AccountBatch::Fetched { partial, .. } => Self {
                source_failed: false,
                failure_reason: None,
                partial: *partial,
                stats,
            },
            AccountBatch::Failed { reason } => Self {
                source_failed: true,
                failure_reason: Some(reason.clone()),
                partial: false,
                stats,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerAccount<T> {
    pub a: T,
    pub b: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMeta {
    pub engine_version: String,
    pub generated_at: String,
    pub timezone: String,
    pub historical_last_date: Option<DayKey>,
    /// BLAKE3 of the series rendered as ledger CSV rows.
    pub fingerprint: String,
}

/// The payload handed to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct RevenueReport {
    pub series: Vec<LedgerEntry>,
    pub today_snapshot: TodaySnapshot,
    pub grand_totals: GrandTotals,
    pub arr: RunRate,
    pub labels: PerAccount<String>,
    pub diagnostics: PerAccount<BatchDiagnostics>,
    pub meta: ReportMeta,
}

impl RevenueReport {
    /// True when either account's data is missing or incomplete.
    pub fn is_degraded(&self) -> bool {
        [&self.diagnostics.a, &self.diagnostics.b]
            .iter()
            .any(|d| d.source_failed || d.partial)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Compute the full revenue report for one request.
///
/// A missing historical ledger fails the run; a failed or partial account
/// batch only sets flags in `diagnostics`.
pub fn compute_revenue_report(
    config: &ReportConfig,
    historical: Option<&HistoricalLedger>,
    batch_a: &AccountBatch,
    batch_b: &AccountBatch,
    now: DateTime<Utc>,
) -> Result<RevenueReport, ReportError> {
    let historical = historical.ok_or(ReportError::MissingHistorical)?;
    let tz = config.timezone()?;
    let days = DayNormalizer::new(tz, now);
    let classifier = Classifier::new(config, &days);

    for (label, batch) in [(&config.accounts.a.label, batch_a), (&config.accounts.b.label, batch_b)] {
        if let AccountBatch::Failed { reason } = batch {
            log::warn!("{}: transaction source failed, contributing zero: {}", label, reason);
        }
    }

    let (daily_a, stats_a) = daily_amounts(&classifier, batch_a);
    let (daily_b, stats_b) = daily_amounts(&classifier, batch_b);

    let series = merge(historical, &daily_a, &daily_b);
    log::debug!(
        "merged {} historical + {} new rows",
        historical.len(),
        series.len() - historical.len(),
    );

    let today_snapshot = select_snapshot(&series, &days, now);
    let grand_totals = GrandTotals::from_series(&series);
    let today = days.day_key(now.timestamp());
    let arr = annual_run_rate(&series, today, config.arr_window_days);
    let fingerprint = fingerprint_series(&series);

    Ok(RevenueReport {
        today_snapshot,
        grand_totals,
        arr,
        labels: PerAccount {
            a: config.accounts.a.label.clone(),
            b: config.accounts.b.label.clone(),
        },
        diagnostics: PerAccount {
            a: BatchDiagnostics::new(batch_a, stats_a),
            b: BatchDiagnostics::new(batch_b, stats_b),
        },
        meta: ReportMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: now.to_rfc3339(),
            timezone: tz.name().to_string(),
            historical_last_date: historical.last_date(),
            fingerprint,
        },
        series,
    })
}

fn daily_amounts(classifier: &Classifier<'_>, batch: &AccountBatch) -> (DailySeries, ClassifyStats) {
    let (deltas, stats) = classifier.classify_batch(batch.transactions());
    (aggregate(deltas), stats)
}

/// First creation instant (epoch seconds) the transport should fetch from:
/// the start of the day after the historical ledger's last date, moved back
/// `availability_lookback_days`, in the reporting timezone. `None` for an
/// empty ledger.
pub fn fetch_window_start(
    historical: &HistoricalLedger,
    config: &ReportConfig,
    now: DateTime<Utc>,
) -> Result<Option<i64>, ReportError> {
    let days = DayNormalizer::new(config.timezone()?, now);
    Ok(historical
        .last_date()
        .and_then(DayKey::succ)
        .map(|day| days.start_of_day(day.minus_days(config.availability_lookback_days))))
}

/// BLAKE3 hex digest of the series as ledger CSV rows (no header).
pub fn fingerprint_series(series: &[LedgerEntry]) -> String {
    let mut hasher = blake3::Hasher::new();
    for entry in series {
        hasher.update(entry.csv_record().join(",").as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
