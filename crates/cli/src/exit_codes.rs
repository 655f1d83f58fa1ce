//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3       | Universal        | I/O error (cannot read/write a file)     |
//! | 4       | Universal        | Parse error (malformed CSV input)        |
//! | 50-59   | fetch            | External data source connectors          |
//! | 60-69   | report           | Ledger and config problems               |
//!
//! A single account failing to fetch inside `revboard report` is NOT an exit
//! error: the report is still produced and the failure is flagged in its
//! `diagnostics` block.
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-4)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// I/O error - file missing, unreadable, or unwritable.
pub const EXIT_IO: u8 = 3;

/// Parse error - malformed CSV input.
pub const EXIT_PARSE: u8 = 4;

// =============================================================================
// Fetch / adapter (50-59): external data source connectors
// =============================================================================

/// No API key provided (neither flag nor env var).
pub const EXIT_FETCH_NOT_AUTH: u8 = 50;

/// Auth rejected by upstream (401/403).
pub const EXIT_FETCH_AUTH: u8 = 51;

/// Bad request rejected by upstream (400).
pub const EXIT_FETCH_VALIDATION: u8 = 52;

/// Rate limited after retries (429).
pub const EXIT_FETCH_RATE_LIMIT: u8 = 53;

/// Upstream error (5xx) or network failure after retries.
pub const EXIT_FETCH_UPSTREAM: u8 = 54;

// =============================================================================
// Report (60-69)
// =============================================================================

/// Historical ledger missing, unordered, or contains duplicate dates.
pub const EXIT_HISTORICAL: u8 = 60;

/// Config file failed to parse or validate.
pub const EXIT_CONFIG: u8 = 61;
