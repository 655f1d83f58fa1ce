use std::fmt;

use serde::Serialize;

use crate::config::{is_currency_code, ReportConfig};
use crate::model::{Amount, RawTransaction, RevenueDelta};
use crate::timezone::DayNormalizer;

// ---------------------------------------------------------------------------
// Exclusions
// ---------------------------------------------------------------------------

/// Field that made a record unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedField {
    Currency,
    AvailableOn,
    Amount,
    Category,
}

impl fmt::Display for MalformedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Currency => write!(f, "currency"),
            Self::AvailableOn => write!(f, "available_on"),
            Self::Amount => write!(f, "amount"),
            Self::Category => write!(f, "category"),
        }
    }
}

/// Why a transaction produced no revenue delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Category outside the revenue set (payouts, fees, transfers, ...).
    NotRevenue,
    /// Raw amount sign contradicts the category (including zero amounts).
    SignMismatch,
    /// A required field is missing or unparseable.
    Malformed(MalformedField),
}

// ---------------------------------------------------------------------------
// Per-batch counters
// ---------------------------------------------------------------------------

/// Counters for one account's batch. Serialized into the report so callers
/// can see what was dropped without the run failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifyStats {
    pub considered: usize,
    pub included: usize,
    pub not_revenue: usize,
    pub sign_mismatch: usize,
    pub malformed: usize,
    /// Included records whose availability timestamp fell back to the
    /// processing day.
    pub day_fallbacks: usize,
}

impl ClassifyStats {
    fn record(&mut self, exclusion: Exclusion) {
        match exclusion {
            Exclusion::NotRevenue => self.not_revenue += 1,
            Exclusion::SignMismatch => self.sign_mismatch += 1,
            Exclusion::Malformed(_) => self.malformed += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Maps raw transactions to signed revenue deltas.
pub struct Classifier<'a> {
    config: &'a ReportConfig,
    days: &'a DayNormalizer,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a ReportConfig, days: &'a DayNormalizer) -> Self {
        Self { config, days }
    }

    /// Classify a single transaction.
    ///
    /// The delta is keyed by the funds-availability day, never the creation
    /// day, and carries the raw amount's sign.
    pub fn classify(&self, tx: &RawTransaction) -> Result<RevenueDelta, Exclusion> {
        self.classify_inner(tx).map(|(delta, _)| delta)
    }

    /// Classify a batch. One bad record never aborts the rest.
    pub fn classify_batch(&self, txs: &[RawTransaction]) -> (Vec<RevenueDelta>, ClassifyStats) {
        let mut stats = ClassifyStats::default();
        let mut deltas = Vec::with_capacity(txs.len());

        for tx in txs {
            stats.considered += 1;
            match self.classify_inner(tx) {
                Ok((delta, fell_back)) => {
                    stats.included += 1;
                    if fell_back {
                        stats.day_fallbacks += 1;
                        log::warn!(
                            "transaction '{}': available_on out of range, attributed to {}",
                            tx.id,
                            delta.day,
                        );
                    }
                    deltas.push(delta);
                }
                Err(exclusion) => {
                    if let Exclusion::Malformed(field) = exclusion {
                        log::warn!("transaction '{}': excluded, malformed {}", tx.id, field);
                    }
                    stats.record(exclusion);
                }
            }
        }

        log::debug!(
            "classified {} transactions: {} included, {} not revenue, {} sign mismatch, {} malformed",
            stats.considered,
            stats.included,
            stats.not_revenue,
            stats.sign_mismatch,
            stats.malformed,
        );

        (deltas, stats)
    }

    fn classify_inner(&self, tx: &RawTransaction) -> Result<(RevenueDelta, bool), Exclusion> {
        let expected = match tx.category.expected_sign() {
            Some(sign) => sign,
            None if tx.category.as_str().trim().is_empty() => {
                return Err(Exclusion::Malformed(MalformedField::Category))
            }
            None => return Err(Exclusion::NotRevenue),
        };

        let currency = tx.currency.trim();
        if !is_currency_code(currency) {
            return Err(Exclusion::Malformed(MalformedField::Currency));
        }
        let available_on = tx
            .available_on
            .ok_or(Exclusion::Malformed(MalformedField::AvailableOn))?;
        let minor = tx
            .amount_minor
            .ok_or(Exclusion::Malformed(MalformedField::Amount))?;

        if !expected.matches(minor) {
            return Err(Exclusion::SignMismatch);
        }

        let amount = Amount::from_minor(minor, self.config.is_zero_decimal(currency))
            .ok_or(Exclusion::Malformed(MalformedField::Amount))?;
        let resolution = self.days.resolve(available_on);

        Ok((
            RevenueDelta {
                day: resolution.day(),
                amount,
            },
            resolution.is_fallback(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountingCategory, DayKey};
    use chrono::{DateTime, Utc};

    const DAY: i64 = 86_400;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-20T19:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// 2025-06-15 12:00 in Los Angeles.
    fn noon_june_15() -> i64 {
        DateTime::parse_from_rfc3339("2025-06-15T19:00:00Z")
            .unwrap()
            .timestamp()
    }

    fn tx(category: &str, amount: i64, currency: &str) -> RawTransaction {
        RawTransaction {
            id: format!("txn_{category}_{amount}"),
            created: Some(noon_june_15()),
            available_on: Some(noon_june_15()),
            amount_minor: Some(amount),
            currency: currency.into(),
            category: AccountingCategory::parse(category),
            status: "available".into(),
        }
    }

    fn with_classifier<R>(f: impl FnOnce(&Classifier<'_>) -> R) -> R {
        let config = ReportConfig::default();
        let days = DayNormalizer::new(config.timezone().unwrap(), now());
        let classifier = Classifier::new(&config, &days);
        f(&classifier)
    }

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    #[test]
    fn charge_attributed_to_availability_day() {
        let mut t = tx("charge", 1000, "usd");
        t.created = Some(noon_june_15() - 3 * DAY);
        let delta = with_classifier(|c| c.classify(&t)).unwrap();
        assert_eq!(delta.day, day("2025-06-15"));
        assert_eq!(delta.amount, Amount::from_major(10));
    }

    #[test]
    fn refund_reduces_revenue() {
        let delta = with_classifier(|c| c.classify(&tx("refund", -500, "usd"))).unwrap();
        assert_eq!(delta.amount, Amount::from_micros(-5_000_000));
    }

    #[test]
    fn contradicting_sign_is_excluded() {
        with_classifier(|c| {
            assert_eq!(c.classify(&tx("charge", -500, "usd")), Err(Exclusion::SignMismatch));
            assert_eq!(c.classify(&tx("refund", 500, "usd")), Err(Exclusion::SignMismatch));
            assert_eq!(c.classify(&tx("charge", 0, "usd")), Err(Exclusion::SignMismatch));
        });
    }

    #[test]
    fn sign_policy_table() {
        with_classifier(|c| {
            let cases = [
                ("dispute", -2000, -20),
                ("dispute_reversal", 2000, 20),
                ("refund_failure", 700, 7),
                ("charge_failure", -300, -3),
                ("adjustment", -100, -1),
                ("payment", 100, 1),
            ];
            for (category, raw, major) in cases {
                let delta = c.classify(&tx(category, raw, "usd")).unwrap();
                assert_eq!(delta.amount, Amount::from_major(major), "{category}");
            }
            assert_eq!(c.classify(&tx("dispute", 2000, "usd")), Err(Exclusion::SignMismatch));
            assert_eq!(
                c.classify(&tx("adjustment", 100, "usd")),
                Err(Exclusion::SignMismatch)
            );
        });
    }

    #[test]
    fn zero_decimal_currency_is_not_scaled() {
        with_classifier(|c| {
            let jpy = c.classify(&tx("charge", 1500, "jpy")).unwrap();
            assert_eq!(jpy.amount, Amount::from_major(1500));
            let usd = c.classify(&tx("charge", 1500, "usd")).unwrap();
            assert_eq!(usd.amount, Amount::from_major(15));
        });
    }

    #[test]
    fn non_revenue_categories_excluded() {
        with_classifier(|c| {
            assert_eq!(c.classify(&tx("payout", -10000, "usd")), Err(Exclusion::NotRevenue));
            assert_eq!(c.classify(&tx("fee", -30, "usd")), Err(Exclusion::NotRevenue));
        });
    }

    #[test]
    fn malformed_records_excluded() {
        with_classifier(|c| {
            assert_eq!(
                c.classify(&tx("charge", 100, "us")),
                Err(Exclusion::Malformed(MalformedField::Currency))
            );
            assert_eq!(
                c.classify(&tx("", 100, "usd")),
                Err(Exclusion::Malformed(MalformedField::Category))
            );
            let mut missing = tx("charge", 100, "usd");
            missing.available_on = None;
            assert_eq!(
                c.classify(&missing),
                Err(Exclusion::Malformed(MalformedField::AvailableOn))
            );
            let mut no_amount = tx("charge", 100, "usd");
            no_amount.amount_minor = None;
            assert_eq!(
                c.classify(&no_amount),
                Err(Exclusion::Malformed(MalformedField::Amount))
            );
        });
    }

    #[test]
    fn batch_counts_every_outcome() {
        let mut out_of_range = tx("charge", 100, "usd");
        out_of_range.available_on = Some(i64::MAX);
        let batch = vec![
            tx("charge", 1000, "usd"),
            tx("charge", -1000, "usd"),
            tx("payout", -5000, "usd"),
            tx("refund", -200, "usd"),
            tx("charge", 100, "????"),
            out_of_range,
        ];
        let (deltas, stats) = with_classifier(|c| c.classify_batch(&batch));
        assert_eq!(deltas.len(), 3);
        assert_eq!(
            stats,
            ClassifyStats {
                considered: 6,
                included: 3,
                not_revenue: 1,
                sign_mismatch: 1,
                malformed: 1,
                day_fallbacks: 1,
            }
        );
        // Fallback lands on the processing day.
        assert_eq!(deltas[2].day, day("2025-06-20"));
    }
}
