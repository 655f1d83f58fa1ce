//! Config file loading and `revboard config`.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use revboard_core::ReportConfig;
use serde::Serialize;

use crate::CliError;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Parse and validate a config file, then print the effective settings
    #[command(after_help = "\
Examples:
  revboard config validate revboard.toml
  revboard config validate revboard.toml --json")]
    Validate {
        /// Config file (TOML)
        file: PathBuf,

        /// Print effective settings as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Load `path`, or defaults when no config is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<ReportConfig, CliError> {
    let Some(path) = path else {
        tracing::debug!("no config file given, using defaults");
        return Ok(ReportConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {}", path.display(), e)))?;
    ReportConfig::from_toml(&text)
        .map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))
}

#[derive(Serialize)]
struct EffectiveConfig<'a> {
    reporting_timezone: &'a str,
    zero_decimal_currencies: Vec<&'a str>,
    max_fetch_pages: u32,
    page_timeout_ms: u64,
    arr_window_days: u32,
    availability_lookback_days: u32,
    accounts: [EffectiveAccount<'a>; 2],
}

#[derive(Serialize)]
struct EffectiveAccount<'a> {
    slot: &'static str,
    label: &'a str,
    api_key_env: &'a str,
    api_key_present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stripe_account: Option<&'a str>,
}

impl<'a> EffectiveConfig<'a> {
    fn new(config: &'a ReportConfig) -> Self {
        let account = |slot: &'static str, acct: &'a revboard_core::config::AccountConfig| EffectiveAccount {
            slot,
            label: &acct.label,
            api_key_env: &acct.api_key_env,
            api_key_present: std::env::var(&acct.api_key_env)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false),
            stripe_account: acct.stripe_account.as_deref(),
        };
        Self {
            reporting_timezone: &config.reporting_timezone,
            zero_decimal_currencies: config.zero_decimal_currencies.iter().map(String::as_str).collect(),
            max_fetch_pages: config.max_fetch_pages,
            page_timeout_ms: config.page_timeout_ms,
            arr_window_days: config.arr_window_days,
            availability_lookback_days: config.availability_lookback_days,
            accounts: [account("a", &config.accounts.a), account("b", &config.accounts.b)],
        }
    }
}

pub fn cmd_config(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Validate { file, json } => {
            let config = load_config(Some(&file))?;
            let effective = EffectiveConfig::new(&config);

            if json {
                let out = serde_json::to_string_pretty(&effective)
                    .map_err(|e| CliError::io(format!("JSON encode error: {}", e)))?;
                println!("{}", out);
                return Ok(());
            }

            println!("ok: {}", file.display());
            println!("  timezone:        {}", effective.reporting_timezone);
            println!("  max_fetch_pages: {}", effective.max_fetch_pages);
            println!("  page_timeout_ms: {}", effective.page_timeout_ms);
            println!("  arr_window_days: {}", effective.arr_window_days);
            println!("  lookback_days:   {}", effective.availability_lookback_days);
            println!("  zero-decimal:    {}", effective.zero_decimal_currencies.join(", "));
            for acct in &effective.accounts {
                println!(
                    "  account {}:       {} (key from {}{})",
                    acct.slot,
                    acct.label,
                    acct.api_key_env,
                    if acct.api_key_present { "" } else { ", not set" },
                );
            }
            Ok(())
        }
    }
}
