//! Shared infrastructure for `revboard fetch` and the live `report` path.
//!
//! - `FetchClient`: HTTP client with timeout / retry / backoff / error classification
//! - `resolve_api_key`: flag > env > error
//! - `parse_date_arg`: parse a `--from` / `--to` date
//! - `open_output`: file or stdout writer

use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;

use crate::exit_codes;
use crate::CliError;

// ── Constants ───────────────────────────────────────────────────────

pub(super) const MAX_RETRIES: u32 = 3;
pub(super) const USER_AGENT: &str = concat!("revboard/", env!("CARGO_PKG_VERSION"));

// ── FetchClient ─────────────────────────────────────────────────────

/// Shared HTTP client that handles retry, backoff, and error classification.
///
/// Adapters own their API key, base URL, and auth method. They pass a
/// request-building closure to [`FetchClient::request_with_retry`] which
/// handles the retry loop and maps HTTP status codes to exit codes.
pub(super) struct FetchClient {
    http: reqwest::blocking::Client,
    source_name: String,
    error_extractor: fn(&serde_json::Value, u16) -> String,
    initial_backoff: Duration,
}

impl FetchClient {
    /// `timeout` bounds each request (connect + body), not the whole fetch.
    pub(super) fn new(
        source_name: &str,
        error_extractor: fn(&serde_json::Value, u16) -> String,
        timeout: Duration,
    ) -> Result<Self, CliError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CliError {
                code: exit_codes::EXIT_FETCH_UPSTREAM,
                message: format!("failed to build HTTP client: {}", e),
                hint: None,
            })?;

        Ok(Self {
            http,
            source_name: source_name.to_string(),
            error_extractor,
            initial_backoff: Duration::from_secs(1),
        })
    }

    #[cfg(test)]
    pub(super) fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn fail(&self, code: u8, message: String) -> CliError {
        CliError {
            code,
            message,
            hint: None,
        }
    }

    /// Make a GET request with retry + exponential backoff.
    ///
    /// `build_request` is called once per attempt. It receives the
    /// underlying `reqwest::blocking::Client` and must return a fully
    /// configured `RequestBuilder` (URL, auth, headers, query params).
    pub(super) fn request_with_retry(
        &self,
        build_request: impl Fn(&reqwest::blocking::Client) -> reqwest::blocking::RequestBuilder,
    ) -> Result<serde_json::Value, CliError> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0u32;

        loop {
            let result = build_request(&self.http).send();

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    // Auth errors: fail immediately
                    if status == 401 || status == 403 {
                        let body: serde_json::Value =
                            resp.json().unwrap_or(serde_json::Value::Null);
                        let msg = (self.error_extractor)(&body, status);
                        return Err(self.fail(
                            exit_codes::EXIT_FETCH_AUTH,
                            format!("{} auth failed ({}): {}", self.source_name, status, msg),
                        ));
                    }

                    // Bad request: fail immediately
                    if status == 400 {
                        let body: serde_json::Value =
                            resp.json().unwrap_or(serde_json::Value::Null);
                        let msg = (self.error_extractor)(&body, status);
                        return Err(self.fail(
                            exit_codes::EXIT_FETCH_VALIDATION,
                            format!("{} request rejected ({}): {}", self.source_name, status, msg),
                        ));
                    }

                    // Other 4xx (not 429): fail immediately
                    if (400..500).contains(&status) && status != 429 {
                        let body: serde_json::Value =
                            resp.json().unwrap_or(serde_json::Value::Null);
                        let msg = (self.error_extractor)(&body, status);
                        return Err(self.fail(
                            exit_codes::EXIT_FETCH_UPSTREAM,
                            format!("{} error ({}): {}", self.source_name, status, msg),
                        ));
                    }

                    // Retryable: 429, 5xx
                    if status == 429 || status >= 500 {
                        if attempt == MAX_RETRIES {
                            let (code, what) = if status == 429 {
                                (exit_codes::EXIT_FETCH_RATE_LIMIT, "rate limited")
                            } else {
                                (exit_codes::EXIT_FETCH_UPSTREAM, "upstream error")
                            };
                            return Err(self.fail(
                                code,
                                format!(
                                    "{} {} after {} attempts ({})",
                                    self.source_name, what, MAX_RETRIES, status,
                                ),
                            ));
                        }

                        // Respect Retry-After header for 429
                        let wait = if status == 429 {
                            resp.headers()
                                .get("retry-after")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .unwrap_or(backoff)
                        } else {
                            backoff
                        };

                        tracing::warn!(
                            "{} retry {}/{} in {:?} (HTTP {})",
                            self.source_name,
                            attempt + 1,
                            MAX_RETRIES,
                            wait,
                            status,
                        );
                        thread::sleep(wait);
                        backoff *= 2;
                        attempt += 1;
                        continue;
                    }

                    // Success: read as text first to tolerate BOM-prefixed bodies
                    let text = resp.text().map_err(|e| {
                        self.fail(
                            exit_codes::EXIT_FETCH_UPSTREAM,
                            format!("failed to read {} response body: {}", self.source_name, e),
                        )
                    })?;
                    let trimmed = text.trim_start_matches('\u{feff}');
                    return serde_json::from_str(trimmed).map_err(|e| {
                        self.fail(
                            exit_codes::EXIT_FETCH_UPSTREAM,
                            format!(
                                "failed to parse {} JSON response: {} (body: {})",
                                self.source_name,
                                e,
                                trimmed.chars().take(200).collect::<String>(),
                            ),
                        )
                    });
                }
                Err(e) => {
                    // Network/timeout errors: retry
                    if attempt == MAX_RETRIES {
                        let what = if e.is_timeout() { "timed out" } else { "upstream error" };
                        return Err(self.fail(
                            exit_codes::EXIT_FETCH_UPSTREAM,
                            format!(
                                "{} {} after {} attempts: {}",
                                self.source_name, what, MAX_RETRIES, e,
                            ),
                        ));
                    }

                    tracing::warn!(
                        "{} retry {}/{} in {:?} ({})",
                        self.source_name,
                        attempt + 1,
                        MAX_RETRIES,
                        backoff,
                        e,
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Resolve an API key: flag value > environment variable > error.
pub(crate) fn resolve_api_key(
    flag: Option<String>,
    source_name: &str,
    env_var: &str,
) -> Result<String, CliError> {
    let key = match flag {
        Some(key) => non_empty(&key),
        None => env_key(env_var),
    };
    key.ok_or_else(|| missing_key(source_name, &format!("use --api-key or set {}", env_var)))
}

/// Read an API key from `env_var` only, for paths with no `--api-key` flag.
pub(crate) fn api_key_from_env(source_name: &str, env_var: &str) -> Result<String, CliError> {
    env_key(env_var).ok_or_else(|| missing_key(source_name, &format!("set {}", env_var)))
}

fn env_key(env_var: &str) -> Option<String> {
    std::env::var(env_var).ok().as_deref().and_then(non_empty)
}

fn non_empty(key: &str) -> Option<String> {
    let trimmed = key.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn missing_key(source_name: &str, how: &str) -> CliError {
    CliError {
        code: exit_codes::EXIT_FETCH_NOT_AUTH,
        message: format!("missing {} API key ({})", source_name, how),
        hint: None,
    }
}

/// Parse a `YYYY-MM-DD` date argument.
pub(super) fn parse_date_arg(value: &str, flag: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| CliError::args(format!("invalid {} date {:?}: {}", flag, value, e)))
}

/// Open the output file, or stdout when `out` is `None`. Returns the
/// writer and a label for progress messages.
pub(crate) fn open_output(out: &Option<PathBuf>) -> Result<(Box<dyn Write>, String), CliError> {
    match out {
        Some(path) => {
            let f = std::fs::File::create(path).map_err(|e| {
                CliError::io(format!("cannot create {}: {}", path.display(), e))
            })?;
            Ok((
                Box::new(std::io::BufWriter::new(f)),
                path.display().to_string(),
            ))
        }
        None => Ok((
            Box::new(std::io::BufWriter::new(std::io::stdout().lock())),
            "stdout".to_string(),
        )),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_api_key_flag_priority() {
        let key = resolve_api_key(Some("  token_123  ".into()), "Test", "TEST_KEY").unwrap();
        assert_eq!(key, "token_123");
    }

    #[test]
    fn test_resolve_api_key_empty_flag() {
        let err = resolve_api_key(Some("  ".into()), "Test", "TEST_KEY").unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH_NOT_AUTH);
        assert!(err.message.contains("missing Test API key"));
    }

    #[test]
    fn test_resolve_api_key_missing() {
        std::env::remove_var("__REVBOARD_TEST_KEY_MISSING");
        let err = resolve_api_key(None, "Test", "__REVBOARD_TEST_KEY_MISSING").unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH_NOT_AUTH);
        assert!(err.message.contains("__REVBOARD_TEST_KEY_MISSING"));
    }

    #[test]
    fn test_resolve_api_key_from_env() {
        std::env::set_var("__REVBOARD_TEST_KEY_SET", " sk_env ");
        let key = resolve_api_key(None, "Test", "__REVBOARD_TEST_KEY_SET").unwrap();
        assert_eq!(key, "sk_env");
    }

    #[test]
    fn test_api_key_from_env_has_no_flag_hint() {
        std::env::remove_var("__REVBOARD_TEST_KEY_ENV_ONLY");
        let err = api_key_from_env("Account A", "__REVBOARD_TEST_KEY_ENV_ONLY").unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH_NOT_AUTH);
        assert_eq!(
            err.message,
            "missing Account A API key (set __REVBOARD_TEST_KEY_ENV_ONLY)"
        );
        assert!(!err.message.contains("--api-key"));

        let err = resolve_api_key(None, "Stripe", "__REVBOARD_TEST_KEY_ENV_ONLY").unwrap_err();
        assert!(err.message.contains("use --api-key"));
    }

    #[test]
    fn test_parse_date_arg() {
        let d = parse_date_arg("2026-01-15", "--from").unwrap();
        assert_eq!(d.to_string(), "2026-01-15");

        let err = parse_date_arg("01/15/2026", "--from").unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_USAGE);
        assert!(err.message.contains("invalid --from date"));
    }
}
