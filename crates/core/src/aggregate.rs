use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Amount, DayKey, RevenueDelta};

/// Net amount per day for one account, iterated in ascending day order.
///
/// Days with no deltas are absent rather than zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySeries {
    days: BTreeMap<DayKey, Amount>,
}

impl DailySeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum into the day's running amount; never overwrites. A sum past the
    /// i64 range saturates and is logged.
    pub fn add(&mut self, delta: RevenueDelta) {
        let slot = self.days.entry(delta.day).or_insert(Amount::ZERO);
        if slot.checked_add(delta.amount).is_none() {
            log::warn!("daily amount for {} out of range, saturated", delta.day);
        }
        *slot += delta.amount;
    }

    /// Amount for `day`, zero when the day is absent.
    pub fn get(&self, day: DayKey) -> Amount {
        self.days.get(&day).copied().unwrap_or(Amount::ZERO)
    }

    pub fn contains(&self, day: DayKey) -> bool {
        self.days.contains_key(&day)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn days(&self) -> impl Iterator<Item = DayKey> + '_ {
        self.days.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DayKey, Amount)> + '_ {
        self.days.iter().map(|(d, a)| (*d, *a))
    }

    pub fn total(&self) -> Amount {
        self.days.values().copied().sum()
    }
}

impl FromIterator<RevenueDelta> for DailySeries {
    fn from_iter<I: IntoIterator<Item = RevenueDelta>>(iter: I) -> Self {
        let mut series = DailySeries::new();
        for delta in iter {
            series.add(delta);
        }
        series
    }
}

impl IntoIterator for DailySeries {
    type Item = (DayKey, Amount);
    type IntoIter = btree_map::IntoIter<DayKey, Amount>;

    fn into_iter(self) -> Self::IntoIter {
        self.days.into_iter()
    }
}

/// Fold deltas into per-day sums. Input order does not matter.
pub fn aggregate(deltas: impl IntoIterator<Item = RevenueDelta>) -> DailySeries {
    deltas.into_iter().collect()
}

/// Days present in either series and strictly after `after`, ascending.
///
/// `after` is the last day already covered by the historical ledger; any
/// overlap from an over-wide fetch window is dropped here.
pub fn candidate_days(a: &DailySeries, b: &DailySeries, after: Option<DayKey>) -> Vec<DayKey> {
    let union: BTreeSet<DayKey> = a.days().chain(b.days()).collect();
    match after {
        Some(cutoff) => union.into_iter().filter(|d| *d > cutoff).collect(),
        None => union.into_iter().collect(),
    }
}
