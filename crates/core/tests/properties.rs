// Property-based tests for the ledger merge.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use revboard_core::aggregate::{aggregate, DailySeries};
use revboard_core::ledger::{merge, HistoricalLedger};
use revboard_core::model::{Amount, DayKey, LedgerEntry, RevenueDelta};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn base_day() -> DayKey {
    DayKey::from_ymd(2025, 1, 1).unwrap()
}

fn offset_day(offset: u32) -> DayKey {
    DayKey::new(base_day().date() + chrono::Duration::days(i64::from(offset)))
}

/// Deltas in cents over a 90-day span, either sign.
fn arb_deltas() -> impl Strategy<Value = Vec<(u32, i64)>> {
    prop::collection::vec((0u32..90, -500_000i64..500_000), 0..60)
}

fn to_series(raw: &[(u32, i64)]) -> DailySeries {
    aggregate(raw.iter().map(|&(off, cents)| RevenueDelta {
        day: offset_day(off),
        amount: Amount::from_micros(cents * 10_000),
    }))
}

/// Historical ledger covering days `0..len` with consistent cumulatives.
fn arb_history() -> impl Strategy<Value = HistoricalLedger> {
    prop::collection::vec((0i64..100_000, 0i64..100_000), 0..40).prop_map(|days| {
        let mut cum_a = Amount::ZERO;
        let mut cum_b = Amount::ZERO;
        let entries = days
            .into_iter()
            .enumerate()
            .map(|(i, (a, b))| {
                let amount_a = Amount::from_micros(a * 10_000);
                let amount_b = Amount::from_micros(b * 10_000);
                cum_a += amount_a;
                cum_b += amount_b;
                LedgerEntry {
                    date: offset_day(i as u32),
                    amount_a,
                    cumulative_a: cum_a,
                    amount_b,
                    cumulative_b: cum_b,
                    total_daily: amount_a + amount_b,
                    total_cumulative: cum_a + cum_b,
                }
            })
            .collect();
        HistoricalLedger::new(entries).unwrap()
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn merge_is_deterministic(
        history in arb_history(),
        a in arb_deltas(),
        b in arb_deltas(),
    ) {
        let sa = to_series(&a);
        let sb = to_series(&b);
        prop_assert_eq!(merge(&history, &sa, &sb), merge(&history, &sa, &sb));
    }

    #[test]
    fn historical_prefix_is_preserved(
        history in arb_history(),
        a in arb_deltas(),
        b in arb_deltas(),
    ) {
        let merged = merge(&history, &to_series(&a), &to_series(&b));
        prop_assert!(merged.len() >= history.len());
        prop_assert_eq!(&merged[..history.len()], history.entries());
    }

    #[test]
    fn dates_strictly_increase(
        history in arb_history(),
        a in arb_deltas(),
        b in arb_deltas(),
    ) {
        let merged = merge(&history, &to_series(&a), &to_series(&b));
        for pair in merged.windows(2) {
            prop_assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn cumulatives_chain(
        history in arb_history(),
        a in arb_deltas(),
        b in arb_deltas(),
    ) {
        let merged = merge(&history, &to_series(&a), &to_series(&b));
        let seed = history.seed();
        let mut prev_a = seed.cumulative_a;
        let mut prev_b = seed.cumulative_b;
        for row in &merged[history.len()..] {
            prop_assert_eq!(row.cumulative_a, prev_a + row.amount_a);
            prop_assert_eq!(row.cumulative_b, prev_b + row.amount_b);
            prop_assert_eq!(row.total_daily, row.amount_a + row.amount_b);
            prop_assert_eq!(row.total_cumulative, row.cumulative_a + row.cumulative_b);
            prev_a = row.cumulative_a;
            prev_b = row.cumulative_b;
        }
    }

    #[test]
    fn overlapping_days_do_not_change_output(
        history in arb_history(),
        a in arb_deltas(),
        stale in arb_deltas(),
    ) {
        let cutoff = history.len() as u32;
        let fresh: Vec<_> = a.iter().copied().filter(|&(off, _)| off >= cutoff).collect();
        let mut widened = fresh.clone();
        widened.extend(stale.iter().copied().filter(|&(off, _)| off < cutoff));
        prop_assert_eq!(
            merge(&history, &to_series(&fresh), &DailySeries::new()),
            merge(&history, &to_series(&widened), &DailySeries::new())
        );
    }

    #[test]
    fn aggregate_is_order_independent(mut raw in arb_deltas()) {
        let forward = to_series(&raw);
        raw.reverse();
        prop_assert_eq!(forward, to_series(&raw));
    }
}
