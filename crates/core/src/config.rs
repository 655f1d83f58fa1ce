use std::collections::BTreeSet;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::ReportError;

/// Stripe's zero-decimal currencies: the smallest unit is already one major unit.
pub const DEFAULT_ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Upper bound for `availability_lookback_days`.
pub const MAX_LOOKBACK_DAYS: u32 = 365;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything the pipeline and its transport need, passed explicitly.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// IANA timezone used for every day boundary.
    pub reporting_timezone: String,
    /// Currency codes whose minor unit equals one major unit.
    pub zero_decimal_currencies: BTreeSet<String>,
    /// Upper bound on pages fetched per account per run.
    pub max_fetch_pages: u32,
    /// Per-request timeout for the transport.
    pub page_timeout_ms: u64,
    /// Trailing window (calendar days, today inclusive) used for ARR.
    pub arr_window_days: u32,
    /// How many days before the historical cutoff the live fetch starts.
    /// The transport filters on creation time while revenue is keyed by
    /// availability, so charges created before the cutoff can still land
    /// after it. The merge drops anything dated on or before the cutoff.
    pub availability_lookback_days: u32,
    pub accounts: AccountsConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            reporting_timezone: DEFAULT_TIMEZONE.to_string(),
            zero_decimal_currencies: DEFAULT_ZERO_DECIMAL_CURRENCIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            max_fetch_pages: 200,
            page_timeout_ms: 30_000,
            arr_window_days: 31,
            availability_lookback_days: 14,
            accounts: AccountsConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountsConfig {
    pub a: AccountConfig,
    pub b: AccountConfig,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            a: AccountConfig {
                label: "Account A".into(),
                api_key_env: "STRIPE_ACCOUNT_A".into(),
                stripe_account: None,
            },
            b: AccountConfig {
                label: "Account B".into(),
                api_key_env: "STRIPE_ACCOUNT_B".into(),
                stripe_account: None,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    /// Display name used in tables and the `labels` payload field.
    pub label: String,
    /// Environment variable holding the account's secret key.
    pub api_key_env: String,
    /// Optional Connect account id sent as `Stripe-Account`.
    #[serde(default)]
    pub stripe_account: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReportConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReportError> {
        let mut config: ReportConfig =
            toml::from_str(input).map_err(|e| ReportError::ConfigParse(e.to_string()))?;
        config.zero_decimal_currencies = config
            .zero_decimal_currencies
            .iter()
            .map(|c| c.trim().to_ascii_uppercase())
            .collect();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        self.timezone()?;

        if self.max_fetch_pages == 0 {
            return Err(ReportError::ConfigValidation(
                "max_fetch_pages must be at least 1".into(),
            ));
        }
        if self.page_timeout_ms == 0 {
            return Err(ReportError::ConfigValidation(
                "page_timeout_ms must be at least 1".into(),
            ));
        }
        if self.arr_window_days == 0 {
            return Err(ReportError::ConfigValidation(
                "arr_window_days must be at least 1".into(),
            ));
        }

        if self.availability_lookback_days > MAX_LOOKBACK_DAYS {
            return Err(ReportError::ConfigValidation(format!(
                "availability_lookback_days must be at most {MAX_LOOKBACK_DAYS}"
            )));
        }

        if let Some(bad) = self
            .zero_decimal_currencies
            .iter()
            .find(|c| !is_currency_code(c))
        {
            return Err(ReportError::ConfigValidation(format!(
                "zero_decimal_currencies: '{bad}' is not a 3-letter currency code"
            )));
        }

        for (slot, account) in [("a", &self.accounts.a), ("b", &self.accounts.b)] {
            if account.label.trim().is_empty() {
                return Err(ReportError::ConfigValidation(format!(
                    "accounts.{slot}: label must not be empty"
                )));
            }
            if account.api_key_env.trim().is_empty() {
                return Err(ReportError::ConfigValidation(format!(
                    "accounts.{slot}: api_key_env must not be empty"
                )));
            }
        }

        Ok(())
    }

    /// The parsed reporting timezone.
    pub fn timezone(&self) -> Result<Tz, ReportError> {
        self.reporting_timezone.parse::<Tz>().map_err(|_| {
            ReportError::ConfigValidation(format!(
                "unknown reporting_timezone '{}' (expected IANA name, e.g. America/New_York)",
                self.reporting_timezone
            ))
        })
    }

    /// Case-insensitive zero-decimal lookup.
    pub fn is_zero_decimal(&self, currency: &str) -> bool {
        self.zero_decimal_currencies
            .contains(&currency.trim().to_ascii_uppercase())
    }
}

/// Three ASCII letters, any case.
pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_alphabetic())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
