//! Stripe balance transactions → `RawTransaction`.
//!
//! Used by `revboard fetch stripe` (dump to CSV) and by `revboard report`
//! (live fetch of both accounts).

use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone};
use revboard_core::model::{AccountingCategory, RawTransaction};
use revboard_core::ReportConfig;

use crate::exit_codes;
use crate::CliError;

use super::common::{self, FetchClient};

// ── Constants ───────────────────────────────────────────────────────

const STRIPE_API_BASE: &str = "https://api.stripe.com";
const PAGE_LIMIT: u32 = 100;

// ── Outcome ─────────────────────────────────────────────────────────

/// Why a fetch stopped before Stripe reported `has_more = false`.
#[derive(Debug)]
pub enum Truncation {
    /// `max_fetch_pages` reached with more data upstream.
    PageCap(u32),
    /// A later page failed after earlier pages were received.
    Failed(CliError),
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub transactions: Vec<RawTransaction>,
    pub pages: u32,
    pub truncated: Option<Truncation>,
}

impl FetchOutcome {
    pub fn is_partial(&self) -> bool {
        self.truncated.is_some()
    }
}

// ── Category mapping ────────────────────────────────────────────────

/// Category for the classifier: `reporting_category` when Stripe sends one,
/// else the raw `type`. Names outside the revenue set pass through unchanged.
fn stripe_category(item: &serde_json::Value) -> AccountingCategory {
    let reporting = item["reporting_category"].as_str().map(str::trim).unwrap_or("");
    if !reporting.is_empty() {
        return AccountingCategory::parse(reporting);
    }
    let raw_type = item["type"].as_str().unwrap_or("");
    AccountingCategory::parse(map_stripe_type(raw_type))
}

fn map_stripe_type(stripe_type: &str) -> &str {
    match stripe_type {
        "payment" => "charge",
        "payment_refund" => "refund",
        "payment_failure_refund" => "refund_failure",
        other => other,
    }
}

// ── Stripe client ───────────────────────────────────────────────────

pub struct StripeClient {
    client: FetchClient,
    api_key: String,
    account: Option<String>,
    base_url: String,
}

impl StripeClient {
    pub fn new(api_key: String, account: Option<String>, timeout: Duration) -> Result<Self, CliError> {
        Self::with_base_url(api_key, account, STRIPE_API_BASE.to_string(), timeout)
    }

    pub fn with_base_url(
        api_key: String,
        account: Option<String>,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, CliError> {
        Ok(Self {
            client: FetchClient::new("Stripe", extract_stripe_error, timeout)?,
            api_key,
            account,
            base_url,
        })
    }

    #[cfg(test)]
    fn without_backoff(mut self) -> Self {
        self.client = self.client.with_initial_backoff(Duration::ZERO);
        self
    }

    /// Fetch balance transactions created at or after `from_epoch` (and before
    /// `to_epoch` when given), up to `max_pages` pages.
    ///
    /// A failure on the first page is an error. A failure on a later page, or
    /// hitting the page cap, returns what was received with `truncated` set.
    pub fn fetch_balance_transactions(
        &self,
        from_epoch: Option<i64>,
        to_epoch: Option<i64>,
        max_pages: u32,
    ) -> Result<FetchOutcome, CliError> {
        let mut transactions = Vec::new();
        let mut starting_after: Option<String> = None;
        let mut pages = 0u32;

        loop {
            if pages == max_pages {
                tracing::warn!(
                    "Stripe{}: stopped at page cap ({} pages, {} transactions); result is partial",
                    self.account_suffix(),
                    max_pages,
                    transactions.len(),
                );
                return Ok(FetchOutcome {
                    transactions,
                    pages,
                    truncated: Some(Truncation::PageCap(max_pages)),
                });
            }

            let page = match self.fetch_page(from_epoch, to_epoch, starting_after.as_deref()) {
                Ok(page) => page,
                Err(err) if pages > 0 => {
                    tracing::warn!(
                        "Stripe{}: page {} failed after {} transactions; result is partial: {}",
                        self.account_suffix(),
                        pages + 1,
                        transactions.len(),
                        err.message,
                    );
                    return Ok(FetchOutcome {
                        transactions,
                        pages,
                        truncated: Some(Truncation::Failed(err)),
                    });
                }
                Err(err) => return Err(err),
            };
            pages += 1;
            tracing::info!("Stripe{}: page {}: {} transactions", self.account_suffix(), pages, page.data.len());

            let last_id = page
                .data
                .last()
                .and_then(|item| item["id"].as_str())
                .map(|s| s.to_string());
            transactions.extend(page.data.iter().map(parse_transaction));

            if !page.has_more {
                break;
            }

            // Pagination: use last item's ID
            let last_id = last_id.ok_or_else(|| CliError {
                code: exit_codes::EXIT_FETCH_UPSTREAM,
                message: "Stripe transaction missing 'id' field for pagination".into(),
                hint: None,
            })?;

            // Infinite loop protection: detect repeated starting_after
            if starting_after.as_deref() == Some(last_id.as_str()) {
                return Err(CliError {
                    code: exit_codes::EXIT_FETCH_UPSTREAM,
                    message: format!("Stripe pagination stuck: starting_after={} repeated", last_id),
                    hint: None,
                });
            }

            starting_after = Some(last_id);
        }

        Ok(FetchOutcome {
            transactions,
            pages,
            truncated: None,
        })
    }

    fn fetch_page(
        &self,
        from_epoch: Option<i64>,
        to_epoch: Option<i64>,
        starting_after: Option<&str>,
    ) -> Result<Page, CliError> {
        let mut params = vec![("limit".to_string(), PAGE_LIMIT.to_string())];
        if let Some(from) = from_epoch {
            params.push(("created[gte]".to_string(), from.to_string()));
        }
        if let Some(to) = to_epoch {
            params.push(("created[lt]".to_string(), to.to_string()));
        }
        if let Some(after) = starting_after {
            params.push(("starting_after".to_string(), after.to_string()));
        }

        let url = format!("{}/v1/balance_transactions", self.base_url);
        let body = self.client.request_with_retry(|http| {
            let mut req = http
                .get(&url)
                .basic_auth(&self.api_key, Some(""))
                .query(&params);
            if let Some(ref acct) = self.account {
                req = req.header("Stripe-Account", acct);
            }
            req
        })?;

        let data = body["data"]
            .as_array()
            .cloned()
            .ok_or_else(|| CliError {
                code: exit_codes::EXIT_FETCH_UPSTREAM,
                message: "Stripe response missing 'data' array".into(),
                hint: None,
            })?;
        let has_more = body["has_more"].as_bool().unwrap_or(false);

        // Guard: has_more but empty data = malformed response
        if has_more && data.is_empty() {
            return Err(CliError {
                code: exit_codes::EXIT_FETCH_UPSTREAM,
                message: "Stripe returned has_more=true with empty data (malformed response)".into(),
                hint: None,
            });
        }

        Ok(Page { data, has_more })
    }

    fn account_suffix(&self) -> String {
        self.account
            .as_ref()
            .map(|a| format!(" [{}]", a))
            .unwrap_or_default()
    }
}

struct Page {
    data: Vec<serde_json::Value>,
    has_more: bool,
}

// ── Parse a single Stripe transaction ───────────────────────────────

/// Field-level lenient: a missing or mistyped field becomes `None` / empty
/// so the classifier counts the record as malformed.
fn parse_transaction(item: &serde_json::Value) -> RawTransaction {
    RawTransaction {
        id: item["id"].as_str().unwrap_or("").to_string(),
        created: item["created"].as_i64(),
        available_on: item["available_on"].as_i64(),
        amount_minor: item["amount"].as_i64(),
        currency: item["currency"].as_str().unwrap_or("").to_string(),
        category: stripe_category(item),
        status: item["status"].as_str().unwrap_or("").to_string(),
    }
}

fn extract_stripe_error(body: &serde_json::Value, status: u16) -> String {
    body["error"]["message"]
        .as_str()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("HTTP {}", status))
}

// ── Entry point ─────────────────────────────────────────────────────

pub struct FetchStripeArgs {
    pub from: String,
    pub to: Option<String>,
    pub api_key: Option<String>,
    pub out: Option<PathBuf>,
    pub account: Option<String>,
    pub quiet: bool,
}

pub fn cmd_fetch_stripe(args: FetchStripeArgs, config: &ReportConfig) -> Result<(), CliError> {
    let key = resolve_api_key(args.api_key)?;
    let tz = config
        .timezone()
        .map_err(|e| CliError::config(e.to_string()))?;

    let from_date = common::parse_date_arg(&args.from, "--from")?;
    let to_date = args
        .to
        .as_deref()
        .map(|s| common::parse_date_arg(s, "--to"))
        .transpose()?;
    if let Some(to) = to_date {
        if from_date >= to {
            return Err(CliError::args(format!(
                "--from ({}) must be before --to ({})",
                from_date, to,
            )));
        }
    }

    // Day boundaries are local midnights in the reporting timezone.
    let from_epoch = local_midnight(&tz, from_date)?;
    let to_epoch = to_date.map(|d| local_midnight(&tz, d)).transpose()?;

    let show_progress = !args.quiet && atty::is(atty::Stream::Stderr);
    if show_progress {
        eprintln!(
            "Fetching Stripe balance transactions ({} to {}, {})...",
            from_date,
            to_date.map(|d| d.to_string()).unwrap_or_else(|| "now".into()),
            tz.name(),
        );
    }

    let client = StripeClient::new(
        key,
        args.account,
        Duration::from_millis(config.page_timeout_ms),
    )?;
    let outcome = client.fetch_balance_transactions(Some(from_epoch), to_epoch, config.max_fetch_pages)?;

    match outcome.truncated {
        Some(Truncation::Failed(err)) => return Err(err),
        Some(Truncation::PageCap(cap)) => {
            eprintln!(
                "warning: stopped after {} pages (max_fetch_pages); output is incomplete",
                cap
            );
        }
        None => {}
    }

    let (writer, out_label) = common::open_output(&args.out)?;
    revboard_io::write_transactions_csv(&outcome.transactions, writer)
        .map_err(|e| CliError::io(e.to_string()))?;

    if show_progress {
        eprintln!(
            "Done: {} transactions written to {}",
            outcome.transactions.len(),
            out_label
        );
    }

    Ok(())
}

fn local_midnight(tz: &chrono_tz::Tz, date: NaiveDate) -> Result<i64, CliError> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::args(format!("invalid date {}", date)))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| CliError::args(format!("{} has no local midnight in {}", date, tz.name())))
}

fn resolve_api_key(flag: Option<String>) -> Result<String, CliError> {
    common::resolve_api_key(flag, "Stripe", "STRIPE_API_KEY")
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> StripeClient {
        StripeClient::with_base_url(
            "sk_test_key".into(),
            None,
            server.base_url(),
            Duration::from_secs(5),
        )
        .unwrap()
        .without_backoff()
    }

    // ── Helper: build a Stripe-shaped transaction JSON ──────────────

    fn mock_txn(id: &str, created: i64, amount: i64, txn_type: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "created": created,
            "available_on": created + 86400,
            "amount": amount,
            "currency": "usd",
            "type": txn_type,
            "status": "available",
        })
    }

    fn stripe_list_response(data: Vec<serde_json::Value>, has_more: bool) -> serde_json::Value {
        serde_json::json!({
            "object": "list",
            "data": data,
            "has_more": has_more,
            "url": "/v1/balance_transactions"
        })
    }

    #[test]
    fn test_category_prefers_reporting_category() {
        let item = serde_json::json!({ "type": "payment", "reporting_category": "refund" });
        assert_eq!(stripe_category(&item), AccountingCategory::Refund);

        let item = serde_json::json!({ "type": "payment" });
        assert_eq!(stripe_category(&item), AccountingCategory::Charge);

        let item = serde_json::json!({ "type": "payment_refund", "reporting_category": "" });
        assert_eq!(stripe_category(&item), AccountingCategory::Refund);

        let item = serde_json::json!({ "type": "payout" });
        assert_eq!(stripe_category(&item), AccountingCategory::Other("payout".into()));
    }

    #[test]
    fn test_parse_transaction_lenient() {
        let item = serde_json::json!({
            "id": "txn_123",
            "created": 1768435200,
            "available_on": "soon",
            "currency": "usd",
            "type": "charge",
        });
        let tx = parse_transaction(&item);
        assert_eq!(tx.id, "txn_123");
        assert_eq!(tx.created, Some(1768435200));
        assert_eq!(tx.available_on, None);
        assert_eq!(tx.amount_minor, None);
        assert_eq!(tx.category, AccountingCategory::Charge);
        assert_eq!(tx.status, "");
    }

    #[test]
    fn test_local_midnight() {
        let la: chrono_tz::Tz = "America/Los_Angeles".parse().unwrap();
        let d = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        // 2026-01-15T08:00:00Z
        assert_eq!(local_midnight(&la, d).unwrap(), 1768464000);
    }

    // ── Pagination across 2 pages ───────────────────────────────────

    #[test]
    fn test_pagination_two_pages() {
        let server = MockServer::start();

        let page1_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/balance_transactions")
                .query_param("created[gte]", "0")
                .query_param("limit", "100")
                .query_param_missing("starting_after");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(stripe_list_response(
                    vec![
                        mock_txn("txn_001", 1000, 5000, "charge"),
                        mock_txn("txn_002", 1001, 3000, "charge"),
                    ],
                    true,
                ));
        });

        let page2_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/balance_transactions")
                .query_param("starting_after", "txn_002");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(stripe_list_response(
                    vec![mock_txn("txn_003", 1002, -100, "stripe_fee")],
                    false,
                ));
        });

        let outcome = client(&server)
            .fetch_balance_transactions(Some(0), None, 10)
            .unwrap();

        page1_mock.assert();
        page2_mock.assert();
        assert!(!outcome.is_partial());
        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.transactions.len(), 3);
        assert_eq!(outcome.transactions[2].id, "txn_003");
        assert_eq!(
            outcome.transactions[2].category,
            AccountingCategory::Other("stripe_fee".into())
        );
    }

    // ── Page cap returns a partial batch ────────────────────────────

    #[test]
    fn test_page_cap_is_partial() {
        let server = MockServer::start();

        let mock = server.mock(|when, then| {
            when.method(GET).path("/v1/balance_transactions");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(stripe_list_response(
                    vec![mock_txn("txn_001", 1000, 5000, "charge")],
                    true,
                ));
        });

        let outcome = client(&server)
            .fetch_balance_transactions(Some(0), None, 1)
            .unwrap();

        mock.assert_calls(1);
        assert!(matches!(outcome.truncated, Some(Truncation::PageCap(1))));
        assert_eq!(outcome.transactions.len(), 1);
    }

    // ── Later page failure returns a partial batch ──────────────────

    #[test]
    fn test_second_page_failure_is_partial() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(GET)
                .path("/v1/balance_transactions")
                .query_param_missing("starting_after");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(stripe_list_response(
                    vec![mock_txn("txn_001", 1000, 5000, "charge")],
                    true,
                ));
        });
        let failing = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/balance_transactions")
                .query_param("starting_after", "txn_001");
            then.status(500);
        });

        let outcome = client(&server)
            .fetch_balance_transactions(Some(0), None, 10)
            .unwrap();

        failing.assert_calls(4);
        match outcome.truncated {
            Some(Truncation::Failed(err)) => assert_eq!(err.code, exit_codes::EXIT_FETCH_UPSTREAM),
            other => panic!("expected Failed truncation, got {:?}", other),
        }
        assert_eq!(outcome.transactions.len(), 1);
    }

    // ── Retry on 429 exhausted ──────────────────────────────────────

    #[test]
    fn test_retry_on_429_exhausted() {
        let server = MockServer::start();

        let rate_limit_mock = server.mock(|when, then| {
            when.method(GET).path("/v1/balance_transactions");
            then.status(429)
                .header("retry-after", "0")
                .json_body(serde_json::json!({
                    "error": { "type": "rate_limit", "message": "Too many requests" }
                }));
        });

        let err = client(&server)
            .fetch_balance_transactions(Some(0), None, 10)
            .unwrap_err();

        assert_eq!(err.code, exit_codes::EXIT_FETCH_RATE_LIMIT);
        assert!(err.message.contains("rate limited"), "message: {}", err.message);
        // 1 initial + 3 retries
        rate_limit_mock.assert_calls(4);
    }

    // ── Auth failure → exit 51 ──────────────────────────────────────

    #[test]
    fn test_auth_failure_exit_51() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(GET).path("/v1/balance_transactions");
            then.status(401).json_body(serde_json::json!({
                "error": {
                    "type": "invalid_request_error",
                    "message": "Invalid API Key provided: sk_test_****_bad"
                }
            }));
        });

        let err = client(&server)
            .fetch_balance_transactions(Some(0), None, 10)
            .unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH_AUTH);
        assert!(err.message.contains("Stripe auth failed (401)"), "message: {}", err.message);
        assert!(err.message.contains("Invalid API Key"), "message: {}", err.message);
    }

    // ── has_more + empty data → error ───────────────────────────────

    #[test]
    fn test_has_more_empty_data_error() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(GET).path("/v1/balance_transactions");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(stripe_list_response(vec![], true));
        });

        let err = client(&server)
            .fetch_balance_transactions(Some(0), None, 10)
            .unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH_UPSTREAM);
        assert!(err.message.contains("has_more=true with empty data"), "message: {}", err.message);
    }

    // ── Connected account header ────────────────────────────────────

    #[test]
    fn test_stripe_account_header() {
        let server = MockServer::start();

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/balance_transactions")
                .header("Stripe-Account", "acct_123");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(stripe_list_response(vec![], false));
        });

        let client = StripeClient::with_base_url(
            "sk_test_key".into(),
            Some("acct_123".into()),
            server.base_url(),
            Duration::from_secs(5),
        )
        .unwrap();
        let outcome = client.fetch_balance_transactions(None, None, 10).unwrap();
        mock.assert();
        assert!(outcome.transactions.is_empty());
    }

    #[test]
    fn test_missing_key_exit_50() {
        std::env::remove_var("STRIPE_API_KEY");
        let err = resolve_api_key(None).unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH_NOT_AUTH);
        assert!(err.message.contains("missing Stripe API key"), "message: {}", err.message);
    }
}
