//! `revboard report`: load the historical ledger, fetch (or read) both
//! accounts, run the pipeline, print the payload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use revboard_core::config::AccountConfig;
use revboard_core::model::DayKey;
use revboard_core::report::fetch_window_start;
use revboard_core::timezone::DayNormalizer;
use revboard_core::{
    compute_revenue_report, AccountBatch, HistoricalLedger, ReportConfig, ReportError,
    RevenueReport,
};
use revboard_io::IoError;

use crate::fetch::api_key_from_env;
use crate::fetch::stripe::StripeClient;
use crate::table::{render_grid, Align};
use crate::CliError;

pub struct ReportArgs {
    pub config: Option<PathBuf>,
    pub historical: PathBuf,
    pub transactions_a: Option<PathBuf>,
    pub transactions_b: Option<PathBuf>,
    pub now: Option<String>,
    pub json: bool,
    pub ledger_out: Option<PathBuf>,
}

pub fn cmd_report(args: ReportArgs) -> Result<(), CliError> {
    let config = crate::config::load_config(args.config.as_deref())?;
    let now = parse_now(args.now.as_deref())?;
    let historical = load_historical(&args.historical)?;

    let (batch_a, batch_b) = match &historical {
        Some(ledger) => {
            let from_epoch = fetch_start(ledger, &config, now)?;
            collect_batches(&config, &args, from_epoch)?
        }
        // Skip the fetch; the pipeline rejects a missing seed below.
        None => (AccountBatch::complete(Vec::new()), AccountBatch::complete(Vec::new())),
    };

    let report = compute_revenue_report(&config, historical.as_ref(), &batch_a, &batch_b, now)
        .map_err(report_error)?;

    if let Some(path) = &args.ledger_out {
        let file = std::fs::File::create(path)
            .map_err(|e| CliError::io(format!("cannot create {}: {}", path.display(), e)))?;
        revboard_io::write_ledger_csv(&report.series, std::io::BufWriter::new(file))
            .map_err(|e| CliError::io(e.to_string()))?;
    }

    if args.json {
        let out = serde_json::to_string(&report)
            .map_err(|e| CliError::io(format!("JSON encode error: {}", e)))?;
        println!("{}", out);
    } else {
        println!("{}", render_human(&report));
    }

    // Degraded runs still succeed; the flags are in the payload.
    if report.is_degraded() {
        warn_degraded(&report);
    }

    Ok(())
}

fn warn_degraded(report: &RevenueReport) {
    for (label, diag) in [
        (&report.labels.a, &report.diagnostics.a),
        (&report.labels.b, &report.diagnostics.b),
    ] {
        if let Some(reason) = &diag.failure_reason {
            eprintln!("warning: {}: source failed, counted as zero ({})", label, reason);
        } else if diag.partial {
            eprintln!("warning: {}: incomplete data (fetch stopped early)", label);
        }
    }
}

// ── Inputs ──────────────────────────────────────────────────────────

fn parse_now(value: Option<&str>) -> Result<DateTime<Utc>, CliError> {
    match value {
        None => Ok(Utc::now()),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CliError::args(format!("invalid --now {:?}: {} (expected RFC 3339)", s, e))),
    }
}

fn load_historical(path: &Path) -> Result<Option<HistoricalLedger>, CliError> {
    revboard_io::load_historical(path).map_err(|e| match e {
        IoError::Ledger(err) => report_error(err),
        IoError::File { .. } => CliError::io(e.to_string()),
        other => CliError::parse(format!("{}: {}", path.display(), other)),
    })
}

/// Live fetch window start (creation time): the lookback before the day
/// after the ledger's last date, or January 1 of the current year for an
/// empty ledger.
fn fetch_start(
    ledger: &HistoricalLedger,
    config: &ReportConfig,
    now: DateTime<Utc>,
) -> Result<i64, CliError> {
    if let Some(start) = fetch_window_start(ledger, config, now).map_err(report_error)? {
        return Ok(start);
    }
    let tz = config.timezone().map_err(report_error)?;
    let days = DayNormalizer::new(tz, now);
    let jan_first = DayKey::from_ymd(days.processing_day().date().year(), 1, 1)
        .unwrap_or_else(|| days.processing_day());
    Ok(days.start_of_day(jan_first))
}

fn collect_batches(
    config: &ReportConfig,
    args: &ReportArgs,
    from_epoch: i64,
) -> Result<(AccountBatch, AccountBatch), CliError> {
    let offline_a = args.transactions_a.as_deref().map(load_batch).transpose()?;
    let offline_b = args.transactions_b.as_deref().map(load_batch).transpose()?;

    // The two accounts are independent; fetch whichever are live in parallel.
    let (a, b) = std::thread::scope(|s| {
        let handle_a = offline_a
            .is_none()
            .then(|| s.spawn(|| fetch_account(&config.accounts.a, config, from_epoch)));
        let b = match offline_b {
            Some(batch) => batch,
            None => fetch_account(&config.accounts.b, config, from_epoch),
        };
        let a = match (offline_a, handle_a) {
            (Some(batch), _) => batch,
            (None, Some(handle)) => handle
                .join()
                .unwrap_or_else(|_| AccountBatch::failed("fetch thread panicked")),
            (None, None) => AccountBatch::failed("no transaction source"),
        };
        (a, b)
    });

    Ok((a, b))
}

fn load_batch(path: &Path) -> Result<AccountBatch, CliError> {
    let txs = revboard_io::load_transactions(path).map_err(|e| match e {
        IoError::File { .. } => CliError::io(e.to_string()),
        other => CliError::parse(format!("{}: {}", path.display(), other)),
    })?;
    Ok(AccountBatch::complete(txs))
}

/// Fetch one account. Every failure becomes `AccountBatch::Failed`.
fn fetch_account(account: &AccountConfig, config: &ReportConfig, from_epoch: i64) -> AccountBatch {
    let key = match api_key_from_env(&account.label, &account.api_key_env) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!("{}: {}", account.label, e.message);
            return AccountBatch::failed(e.message);
        }
    };

    let client = match StripeClient::new(
        key,
        account.stripe_account.clone(),
        Duration::from_millis(config.page_timeout_ms),
    ) {
        Ok(client) => client,
        Err(e) => return AccountBatch::failed(e.message),
    };

    match client.fetch_balance_transactions(Some(from_epoch), None, config.max_fetch_pages) {
        Ok(outcome) => {
            let partial = outcome.is_partial();
            tracing::info!(
                "{}: {} transactions in {} pages{}",
                account.label,
                outcome.transactions.len(),
                outcome.pages,
                if partial { " (partial)" } else { "" },
            );
            AccountBatch::Fetched {
                transactions: outcome.transactions,
                partial,
            }
        }
        Err(e) => {
            tracing::warn!("{}: fetch failed: {}", account.label, e.message);
            AccountBatch::failed(e.message)
        }
    }
}

fn report_error(err: ReportError) -> CliError {
    match err {
        ReportError::MissingHistorical => CliError::historical(err.to_string())
            .with_hint("pass --historical <ledger.csv>; an empty ledger needs at least the header row"),
        ReportError::InvalidHistorical(_) => CliError::historical(err.to_string()),
        ReportError::ConfigParse(_) | ReportError::ConfigValidation(_) => {
            CliError::config(err.to_string())
        }
    }
}

// ── Human output ────────────────────────────────────────────────────

pub(crate) fn render_human(report: &RevenueReport) -> String {
    let a = &report.labels.a;
    let b = &report.labels.b;
    let headers = [
        "Date".to_string(),
        format!("Daily Revenue ({})", a),
        format!("Cumulative Revenue ({})", a),
        format!("Daily Revenue ({})", b),
        format!("Cumulative Revenue ({})", b),
        "Total Daily Revenue".to_string(),
        "Total Cumulative Revenue".to_string(),
    ];
    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
    let mut align = vec![Align::Right; headers.len()];
    align[0] = Align::Left;

    let rows: Vec<Vec<String>> = report
        .series
        .iter()
        .map(|e| {
            vec![
                e.date.to_string(),
                e.amount_a.to_dollars(),
                e.cumulative_a.to_dollars(),
                e.amount_b.to_dollars(),
                e.cumulative_b.to_dollars(),
                e.total_daily.to_dollars(),
                e.total_cumulative.to_dollars(),
            ]
        })
        .collect();

    let snap = &report.today_snapshot;
    let snap_label = match (snap.date, snap.is_today) {
        (Some(d), true) => format!("Today ({})", d),
        (Some(d), false) => format!("Latest day ({}, no revenue yet today)", d),
        (None, _) => "Today (no data)".to_string(),
    };

    let mut out = String::new();
    out.push_str("Revenue Comparison:\n");
    out.push_str(&render_grid(&header_refs, &align, &rows));
    out.push_str(&format!("\n\n{}:\n", snap_label));
    out.push_str(&format!("{}: {}\n", a, snap.a.to_dollars()));
    out.push_str(&format!("{}: {}\n", b, snap.b.to_dollars()));
    out.push_str(&format!("Total: {}\n", snap.total.to_dollars()));
    out.push_str("\nTotal revenue:\n");
    out.push_str(&format!("{}: {}\n", a, report.grand_totals.a.to_dollars()));
    out.push_str(&format!("{}: {}\n", b, report.grand_totals.b.to_dollars()));
    out.push_str(&format!("Total: {}\n", report.grand_totals.total.to_dollars()));

    let window = match (report.arr.window_start, report.arr.window_end) {
        (Some(s), Some(e)) => format!(" ({} to {})", s, e),
        _ => String::new(),
    };
    out.push_str(&format!("\nCurrent ARR (Annual Recurring Revenue) based on trailing window{}:\n", window));
    out.push_str(&format!("{} ARR: {}\n", a, report.arr.a.to_dollars()));
    out.push_str(&format!("{} ARR: {}\n", b, report.arr.b.to_dollars()));
    out.push_str(&format!("Total ARR: {}", report.arr.total.to_dollars()));
    out
}
