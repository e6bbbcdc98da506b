//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `nepse` exit codes.
//! Exit codes are part of the shell contract; cron jobs and supervisors
//! rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                |
//! |---------|------------|--------------------------------------------|
//! | 0       | Universal  | Success                                    |
//! | 1       | Universal  | General error (unspecified)                |
//! | 2       | Universal  | CLI usage error (bad args, missing file)   |
//! | 3       | Universal  | Configuration error                        |
//! | 4       | Universal  | Local IO error                             |
//! | 10-19   | scrape     | Fetching and parsing source tables         |
//! | 20-29   | publish    | Delivering the rendered page               |
//! | 30-39   | refresh    | Outcome of a refresh pass                  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use crate::publish::PublishError;
use crate::scrape::ScrapeError;

// =============================================================================
// Universal (0-4)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing input files.
pub const EXIT_USAGE: u8 = 2;

/// Config file unreadable, unparseable or invalid; missing credentials.
pub const EXIT_CONFIG: u8 = 3;

/// Local read/write failure.
pub const EXIT_IO: u8 = 4;

// =============================================================================
// Scrape (10-19)
// =============================================================================

/// Network failure or retries exhausted.
pub const EXIT_SCRAPE_NETWORK: u8 = 10;

/// Upstream answered with a non-retryable HTTP status.
pub const EXIT_SCRAPE_HTTP: u8 = 11;

/// Page fetched but the table was not found or had no usable header.
pub const EXIT_SCRAPE_TABLE: u8 = 12;

// =============================================================================
// Publish (20-29)
// =============================================================================

/// Cannot reach the FTP host.
pub const EXIT_PUBLISH_CONNECT: u8 = 20;

/// FTP login rejected.
pub const EXIT_PUBLISH_AUTH: u8 = 21;

/// Upload or local write failed.
pub const EXIT_PUBLISH_TRANSFER: u8 = 22;

// =============================================================================
// Refresh (30-39)
// =============================================================================

/// The primary table came back empty; nothing rendered or published.
pub const EXIT_REFRESH_EMPTY: u8 = 30;

/// Too many N/A cells; the pass was discarded.
pub const EXIT_REFRESH_DEGRADED: u8 = 31;

/// Another pass was already running.
pub const EXIT_REFRESH_BUSY: u8 = 32;

// =============================================================================
// Mapping helpers
// =============================================================================

pub fn scrape_exit_code(err: &ScrapeError) -> u8 {
    match err {
        ScrapeError::Network { .. } => EXIT_SCRAPE_NETWORK,
        ScrapeError::Status { .. } => EXIT_SCRAPE_HTTP,
        ScrapeError::NoUrl { .. } => EXIT_CONFIG,
        ScrapeError::TableNotFound { .. }
        | ScrapeError::BadSelector { .. }
        | ScrapeError::NoHeader { .. }
        | ScrapeError::MissingColumn { .. } => EXIT_SCRAPE_TABLE,
    }
}

pub fn publish_exit_code(err: &PublishError) -> u8 {
    match err {
        PublishError::Connect(_) => EXIT_PUBLISH_CONNECT,
        PublishError::Auth(_) => EXIT_PUBLISH_AUTH,
        PublishError::Transfer(_) | PublishError::Io(_) => EXIT_PUBLISH_TRANSFER,
    }
}
