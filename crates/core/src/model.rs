use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// Scale factor: 1 major currency unit = 1_000_000 micro-units.
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// Micro-units per minor unit for two-decimal currencies (1 cent = 10_000).
const MICROS_PER_CENT: i64 = MICROS_PER_UNIT / 100;

/// Signed amount in micro-units of the major currency unit.
///
/// Integer storage keeps daily sums and running totals exact, so merging the
/// same inputs twice always yields identical rows. JSON renders the value as
/// a decimal number in major units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Whole major units, e.g. `Amount::from_major(15)` is 15.00.
    pub const fn from_major(units: i64) -> Self {
        Self(units * MICROS_PER_UNIT)
    }

    /// Convert a minor-unit amount to micro-units.
    ///
    /// Zero-decimal currencies (JPY, KRW, ...) already count in whole units.
    /// Returns `None` on overflow.
    pub fn from_minor(minor: i64, zero_decimal: bool) -> Option<Self> {
        let scale = if zero_decimal { MICROS_PER_UNIT } else { MICROS_PER_CENT };
        minor.checked_mul(scale).map(Self)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `None` when the sum leaves the representable range.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn saturating_mul(self, factor: i64) -> Amount {
        Amount(self.0.saturating_mul(factor))
    }

    pub fn to_major_f64(self) -> f64 {
        self.0 as f64 / MICROS_PER_UNIT as f64
    }

    /// Fixed 6-decimal rendering used in CSV files: `-5000000` → `"-5.000000"`.
    pub fn to_fixed(self) -> String {
        let abs = self.0.unsigned_abs();
        let whole = abs / MICROS_PER_UNIT as u64;
        let frac = abs % MICROS_PER_UNIT as u64;
        if self.0 < 0 {
            format!("-{whole}.{frac:06}")
        } else {
            format!("{whole}.{frac:06}")
        }
    }

    /// Human rendering rounded to cents with thousands separators: `$1,234.56`.
    pub fn to_dollars(self) -> String {
        let abs = self.0.unsigned_abs();
        // Round half away from zero to the nearest cent.
        let cents = (abs + MICROS_PER_CENT as u64 / 2) / MICROS_PER_CENT as u64;
        let whole = group_thousands(cents / 100);
        let frac = cents % 100;
        if self.0 < 0 && cents > 0 {
            format!("-${whole}.{frac:02}")
        } else {
            format!("${whole}.{frac:02}")
        }
    }

    /// Parse a decimal string with up to 6 fractional digits.
    ///
    /// Accepts `"100"`, `"100."`, `"-5.5"`, `"1234.567890"`. Returns `None`
    /// for anything else (including more than 6 decimals).
    pub fn parse_decimal(s: &str) -> Option<Self> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole_str, frac_str) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole_str.is_empty() && frac_str.is_empty() {
            return None;
        }
        if frac_str.len() > 6
            || !whole_str.bytes().all(|b| b.is_ascii_digit())
            || !frac_str.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let whole: i64 = if whole_str.is_empty() { 0 } else { whole_str.parse().ok()? };
        let frac: i64 = format!("{frac_str:0<6}").parse().ok()?;
        let abs = whole.checked_mul(MICROS_PER_UNIT)?.checked_add(frac)?;
        Some(Self(if negative { -abs } else { abs }))
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// Arithmetic saturates at the i64 bounds instead of wrapping or panicking.
// Callers that need to report the overflow use `checked_add`.

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        *self = *self + rhs;
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount(self.0.saturating_neg())
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fixed())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_major_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Int(units) => units
                .checked_mul(MICROS_PER_UNIT)
                .map(Amount)
                .ok_or_else(|| serde::de::Error::custom(format!("amount out of range: {units}"))),
            Repr::Float(v) => Ok(Amount((v * MICROS_PER_UNIT as f64).round() as i64)),
            Repr::Text(s) => Amount::parse_decimal(&s)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid amount '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Day key
// ---------------------------------------------------------------------------

/// Calendar day in the reporting timezone. Renders as `YYYY-MM-DD`.
///
/// Ordering matches the lexicographic order of the rendered key because the
/// format is fixed-width and zero-padded (years are kept within 0001..=9999).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    pub fn parse(s: &str) -> Option<Self> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok().map(Self)
    }

    pub fn succ(self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    /// The day `days` calendar days earlier, saturating at the minimum date.
    pub fn minus_days(self, days: u32) -> Self {
        self.0
            .checked_sub_days(chrono::Days::new(u64::from(days)))
            .map(Self)
            .unwrap_or(Self(NaiveDate::MIN))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DayKey::parse(s).ok_or_else(|| format!("invalid day key '{s}' (expected YYYY-MM-DD)"))
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// Accounting category of a processor balance transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccountingCategory {
    Charge,
    Refund,
    Dispute,
    DisputeReversal,
    RefundFailure,
    ChargeFailure,
    Adjustment,
    /// Anything else (payouts, fees, transfers, ...). Empty when the source
    /// record carried no category at all.
    Other(String),
}

/// Expected sign of a category's raw amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn matches(self, value: i64) -> bool {
        match self {
            Sign::Positive => value > 0,
            Sign::Negative => value < 0,
        }
    }
}

impl AccountingCategory {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "charge" | "payment" => Self::Charge,
            "refund" => Self::Refund,
            "dispute" => Self::Dispute,
            "dispute_reversal" => Self::DisputeReversal,
            "refund_failure" => Self::RefundFailure,
            "charge_failure" => Self::ChargeFailure,
            "adjustment" | "other_adjustment" => Self::Adjustment,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Charge => "charge",
            Self::Refund => "refund",
            Self::Dispute => "dispute",
            Self::DisputeReversal => "dispute_reversal",
            Self::RefundFailure => "refund_failure",
            Self::ChargeFailure => "charge_failure",
            Self::Adjustment => "adjustment",
            Self::Other(raw) => raw,
        }
    }

    /// Sign a revenue-relevant category's raw amount must have to be counted.
    /// `None` for categories outside the revenue set.
    pub fn expected_sign(&self) -> Option<Sign> {
        match self {
            Self::Charge | Self::DisputeReversal | Self::RefundFailure => Some(Sign::Positive),
            Self::Refund | Self::Dispute | Self::ChargeFailure | Self::Adjustment => {
                Some(Sign::Negative)
            }
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for AccountingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AccountingCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AccountingCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(AccountingCategory::parse(&s))
    }
}

/// One balance transaction as supplied by the transport layer.
///
/// Timestamps and amount are optional so that a single incomplete upstream
/// record is counted as malformed instead of failing the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub id: String,
    /// Creation time, epoch seconds. Carried for display only.
    pub created: Option<i64>,
    /// Funds-availability time, epoch seconds. Drives day attribution.
    pub available_on: Option<i64>,
    /// Signed amount in the currency's minor unit.
    pub amount_minor: Option<i64>,
    pub currency: String,
    pub category: AccountingCategory,
    #[serde(default)]
    pub status: String,
}

// ---------------------------------------------------------------------------
// Classified output
// ---------------------------------------------------------------------------

/// Signed revenue contribution of one transaction, keyed by day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueDelta {
    pub day: DayKey,
    pub amount: Amount,
}

/// One combined ledger row.
///
/// `cumulative_* = previous cumulative + amount_*`,
/// `total_daily = amount_a + amount_b`,
/// `total_cumulative = cumulative_a + cumulative_b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: DayKey,
    pub amount_a: Amount,
    pub cumulative_a: Amount,
    pub amount_b: Amount,
    pub cumulative_b: Amount,
    pub total_daily: Amount,
    pub total_cumulative: Amount,
}

/// Column order of the ledger CSV.
pub const LEDGER_HEADER: [&str; 7] = [
    "date",
    "amount_a",
    "cumulative_a",
    "amount_b",
    "cumulative_b",
    "total_daily",
    "total_cumulative",
];

impl LedgerEntry {
    /// Fields in [`LEDGER_HEADER`] order, amounts in fixed 6-decimal form.
    pub fn csv_record(&self) -> [String; 7] {
        [
            self.date.to_string(),
            self.amount_a.to_fixed(),
            self.cumulative_a.to_fixed(),
            self.amount_b.to_fixed(),
            self.cumulative_b.to_fixed(),
            self.total_daily.to_fixed(),
            self.total_cumulative.to_fixed(),
        ]
    }
}
