//! Historical ledger + new daily deltas → one combined cumulative series.
//!
//! The historical prefix is ground truth and is copied verbatim. Only days
//! strictly after its last date are computed, starting from the cumulative
//! totals of its last row.

use crate::aggregate::{candidate_days, DailySeries};
use crate::error::ReportError;
use crate::model::{Amount, DayKey, LedgerEntry};

/// Running totals the new segment starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Seed {
    pub cumulative_a: Amount,
    pub cumulative_b: Amount,
    pub total_cumulative: Amount,
}

/// Precomputed, immutable ledger with strictly increasing dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricalLedger {
    entries: Vec<LedgerEntry>,
}

impl HistoricalLedger {
    /// Validate ordering. Rows must already be sorted; duplicates or
    /// out-of-order dates are rejected rather than silently re-sorted.
    pub fn new(entries: Vec<LedgerEntry>) -> Result<Self, ReportError> {
        for pair in entries.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ReportError::InvalidHistorical(format!(
                    "dates must be strictly increasing: {} follows {}",
                    pair[1].date, pair[0].date
                )));
            }
        }

        let ledger = Self { entries };
        let seed = ledger.seed();
        if seed.total_cumulative != seed.cumulative_a + seed.cumulative_b {
            log::warn!(
                "historical total_cumulative {} differs from cumulative_a + cumulative_b {}; \
                 per-account cumulatives seed the new segment",
                seed.total_cumulative,
                seed.cumulative_a + seed.cumulative_b,
            );
        }
        Ok(ledger)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_date(&self) -> Option<DayKey> {
        self.entries.last().map(|e| e.date)
    }

    /// Cumulative values of the last row, or zero for an empty ledger.
    pub fn seed(&self) -> Seed {
        self.entries
            .last()
            .map(|e| Seed {
                cumulative_a: e.cumulative_a,
                cumulative_b: e.cumulative_b,
                total_cumulative: e.total_cumulative,
            })
            .unwrap_or_default()
    }
}

/// Build the combined series: historical rows, then one row per new day.
///
/// Re-running with the same inputs (or with a superset whose extra days fall
/// on or before the historical cutoff) yields the same output.
pub fn merge(historical: &HistoricalLedger, a: &DailySeries, b: &DailySeries) -> Vec<LedgerEntry> {
    let days = candidate_days(a, b, historical.last_date());
    let overlap = a.days().chain(b.days()).filter(|d| Some(*d) <= historical.last_date()).count();
    if overlap > 0 {
        log::debug!(
            "ignoring {} daily amount(s) on or before historical cutoff {:?}",
            overlap,
            historical.last_date().map(|d| d.to_string()),
        );
    }

    let mut series = Vec::with_capacity(historical.len() + days.len());
    series.extend_from_slice(historical.entries());

    let seed = historical.seed();
    let mut cumulative_a = seed.cumulative_a;
    let mut cumulative_b = seed.cumulative_b;

    for day in days {
        let amount_a = a.get(day);
        let amount_b = b.get(day);
        accumulate(&mut cumulative_a, amount_a, day);
        accumulate(&mut cumulative_b, amount_b, day);
        series.push(LedgerEntry {
            date: day,
            amount_a,
            cumulative_a,
            amount_b,
            cumulative_b,
            total_daily: amount_a + amount_b,
            total_cumulative: cumulative_a + cumulative_b,
        });
    }

    series
}

fn accumulate(total: &mut Amount, amount: Amount, day: DayKey) {
    if total.checked_add(amount).is_none() {
        log::warn!("cumulative total on {} out of range, saturated", day);
    }
    *total += amount;
}
