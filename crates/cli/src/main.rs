// revboard - two-account revenue dashboard, headless
// Prints the merged daily ledger, today's snapshot and ARR for two Stripe accounts.

mod config;
mod exit_codes;
mod fetch;
mod logging;
mod report;
mod table;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use config::ConfigCommands;
use exit_codes::{EXIT_CONFIG, EXIT_HISTORICAL, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE};
use fetch::FetchCommands;

#[derive(Parser)]
#[command(name = "revboard")]
#[command(about = "Daily and cumulative revenue for two Stripe accounts")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the revenue report: historical ledger + live (or offline) transactions
    #[command(after_help = "\
Examples:
  revboard report --historical historical_data.csv
  revboard report --historical historical_data.csv --json
  revboard report --historical ledger.csv --transactions-a a.csv --transactions-b b.csv
  revboard report --historical ledger.csv --ledger-out merged.csv --now 2026-03-01T12:00:00Z

Exit codes:
  0   report produced (a failed account is flagged, not fatal)
  3   file not readable
  4   malformed CSV
  60  historical ledger missing or out of order
  61  invalid config")]
    Report {
        /// Historical ledger CSV (seed for cumulative totals)
        #[arg(long, env = "REVBOARD_HISTORICAL", default_value = "historical_data.csv")]
        historical: PathBuf,

        /// Report config (TOML)
        #[arg(long, env = "REVBOARD_CONFIG")]
        config: Option<PathBuf>,

        /// Read account A transactions from CSV instead of fetching
        #[arg(long, value_name = "CSV")]
        transactions_a: Option<PathBuf>,

        /// Read account B transactions from CSV instead of fetching
        #[arg(long, value_name = "CSV")]
        transactions_b: Option<PathBuf>,

        /// Evaluation instant (RFC 3339; default: now)
        #[arg(long)]
        now: Option<String>,

        /// Print the report payload as JSON
        #[arg(long)]
        json: bool,

        /// Also write the merged series as a ledger CSV
        #[arg(long, value_name = "PATH")]
        ledger_out: Option<PathBuf>,
    },

    /// Fetch raw transactions from an external source into CSV
    #[command(subcommand)]
    Fetch(FetchCommands),

    /// Inspect and validate config files
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  revboard-core ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  revboard-core ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing();

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: revboard <command> [options]");
            eprintln!("       revboard --help for more information");
            Ok(())
        }
        Some(Commands::Report {
            historical,
            config,
            transactions_a,
            transactions_b,
            now,
            json,
            ledger_out,
        }) => report::cmd_report(report::ReportArgs {
            config,
            historical,
            transactions_a,
            transactions_b,
            now,
            json,
            ledger_out,
        }),
        Some(Commands::Fetch(command)) => fetch::cmd_fetch(command),
        Some(Commands::Config(command)) => config::cmd_config(command),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    pub fn historical(msg: impl Into<String>) -> Self {
        Self { code: EXIT_HISTORICAL, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_defaults() {
        let cli = Cli::try_parse_from(["revboard", "report"]).unwrap();
        match cli.command {
            Some(Commands::Report { historical, json, .. }) => {
                // REVBOARD_HISTORICAL may override in a dev shell.
                if std::env::var_os("REVBOARD_HISTORICAL").is_none() {
                    assert_eq!(historical, PathBuf::from("historical_data.csv"));
                }
                assert!(!json);
            }
            _ => panic!("expected report"),
        }
    }

    #[test]
    fn with_hint_keeps_code() {
        let err = CliError::config("bad").with_hint("fix it");
        assert_eq!(err.code, EXIT_CONFIG);
        assert_eq!(err.hint.as_deref(), Some("fix it"));
    }
}
