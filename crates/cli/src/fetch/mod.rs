//! `revboard fetch`: pull raw balance transactions into CSV.

mod common;
pub mod stripe;

use std::path::PathBuf;

use clap::Subcommand;

use crate::config::load_config;
use crate::CliError;

pub(crate) use common::api_key_from_env;

#[derive(Subcommand)]
pub enum FetchCommands {
    /// Fetch balance transactions from Stripe
    #[command(after_help = "\
Examples:
  revboard fetch stripe --from 2026-01-01 --to 2026-01-31
  revboard fetch stripe --from 2026-01-01 --out interview-coder.csv
  revboard fetch stripe --from 2026-01-01 --api-key sk_live_...
  STRIPE_API_KEY=sk_live_... revboard fetch stripe --from 2026-01-01 --to 2026-01-31")]
    Stripe {
        /// Start date inclusive (YYYY-MM-DD, reporting timezone)
        #[arg(long)]
        from: String,

        /// End date exclusive (YYYY-MM-DD, reporting timezone; default: now)
        #[arg(long)]
        to: Option<String>,

        /// Stripe secret key (default: STRIPE_API_KEY env)
        #[arg(long)]
        api_key: Option<String>,

        /// Output CSV file path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Stripe Connect account ID (acct_...)
        #[arg(long)]
        account: Option<String>,

        /// Report config (timezone, page cap, timeout)
        #[arg(long, env = "REVBOARD_CONFIG")]
        config: Option<PathBuf>,

        /// Suppress progress on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },
}

pub fn cmd_fetch(command: FetchCommands) -> Result<(), CliError> {
    match command {
        FetchCommands::Stripe {
            from,
            to,
            api_key,
            out,
            account,
            config,
            quiet,
        } => {
            let config = load_config(config.as_deref())?;
            stripe::cmd_fetch_stripe(
                stripe::FetchStripeArgs {
                    from,
                    to,
                    api_key,
                    out,
                    account,
                    quiet,
                },
                &config,
            )
        }
    }
}
