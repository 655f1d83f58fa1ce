use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Amount, DayKey, LedgerEntry};
use crate::timezone::DayNormalizer;

/// Daily amounts for "today", or for the most recent day when today has no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TodaySnapshot {
    pub a: Amount,
    pub b: Amount,
    pub total: Amount,
    /// `None` only when the series is empty.
    pub date: Option<DayKey>,
    pub is_today: bool,
}

impl TodaySnapshot {
    /// All-zero snapshot with no date, used for an empty series.
    pub fn zero() -> Self {
        Self {
            a: Amount::ZERO,
            b: Amount::ZERO,
            total: Amount::ZERO,
            date: None,
            is_today: false,
        }
    }

    fn from_entry(entry: &LedgerEntry, is_today: bool) -> Self {
        Self {
            a: entry.amount_a,
            b: entry.amount_b,
            total: entry.total_daily,
            date: Some(entry.date),
            is_today,
        }
    }
}

/// Pick today's row from `series` if present, else its last row.
pub fn select_snapshot(series: &[LedgerEntry], days: &DayNormalizer, now: DateTime<Utc>) -> TodaySnapshot {
    select_for_day(series, days.day_key(now.timestamp()))
}

/// Same as [`select_snapshot`] with today's key already resolved.
/// `series` must be sorted by date.
pub fn select_for_day(series: &[LedgerEntry], today: DayKey) -> TodaySnapshot {
    if let Ok(idx) = series.binary_search_by_key(&today, |e| e.date) {
        return TodaySnapshot::from_entry(&series[idx], true);
    }
    series
        .last()
        .map(|e| TodaySnapshot::from_entry(e, false))
        .unwrap_or_else(TodaySnapshot::zero)
}

/// Cumulative totals at the end of the series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GrandTotals {
    pub a: Amount,
    pub b: Amount,
    pub total: Amount,
}

impl GrandTotals {
    pub fn from_series(series: &[LedgerEntry]) -> Self {
        series
            .last()
            .map(|e| Self {
                a: e.cumulative_a,
                b: e.cumulative_b,
                total: e.total_cumulative,
            })
            .unwrap_or_default()
    }
}
