use serde::Serialize;

use crate::model::{Amount, DayKey, LedgerEntry};

/// Annualized revenue: 12 × the trailing window's net revenue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunRate {
    pub a: Amount,
    pub b: Amount,
    pub total: Amount,
    pub window_start: Option<DayKey>,
    pub window_end: Option<DayKey>,
}

const MONTHS_PER_YEAR: i64 = 12;

/// Sum daily amounts for days in `[today - (window_days - 1), today]` and
/// annualize. Rows after `today` (future availability dates) are ignored.
pub fn annual_run_rate(series: &[LedgerEntry], today: DayKey, window_days: u32) -> RunRate {
    if window_days == 0 {
        return RunRate::default();
    }
    let start = today.minus_days(window_days - 1);

    let (a, b) = series
        .iter()
        .filter(|e| e.date >= start && e.date <= today)
        .fold((Amount::ZERO, Amount::ZERO), |(a, b), e| (a + e.amount_a, b + e.amount_b));

    let a = a.saturating_mul(MONTHS_PER_YEAR);
    let b = b.saturating_mul(MONTHS_PER_YEAR);

    RunRate {
        a,
        b,
        total: a + b,
        window_start: Some(start),
        window_end: Some(today),
    }
}
