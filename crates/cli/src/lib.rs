//! `nepse`: scrape the NEPSE boards, reconcile them, render and publish
//! the live page.

pub mod exit_codes;
pub mod export;
pub mod health;
pub mod publish;
pub mod refresh;
pub mod render;
pub mod scheduler;
pub mod scrape;
pub mod signals;
pub mod snapshot;

use std::fmt;

use nepse_config::ConfigError;
use nepse_recon::ReconError;

use exit_codes::{publish_exit_code, scrape_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_IO, EXIT_USAGE};
use publish::PublishError;
use scrape::ScrapeError;

/// A failure surfaced to the shell: message, optional hint, exit code.
#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn scrape(err: &ScrapeError) -> Self {
        let hint = match err {
            ScrapeError::Network { .. } => Some("check connectivity or raise fetch.timeout_secs"),
            ScrapeError::TableNotFound { .. } | ScrapeError::MissingColumn { .. } => {
                Some("the page layout may have changed; check the source's table and columns")
            }
            ScrapeError::NoUrl { .. } => Some("set url = \"...\" under the source in the recon config"),
            _ => None,
        };
        Self {
            code: scrape_exit_code(err),
            message: err.to_string(),
            hint: hint.map(String::from),
        }
    }

    pub fn publish(err: &PublishError) -> Self {
        let hint = match err {
            PublishError::Auth(_) => Some("check the FTP user and password variables"),
            PublishError::Connect(_) => Some("check the FTP host variable and publish.port"),
            _ => None,
        };
        Self {
            code: publish_exit_code(err),
            message: err.to_string(),
            hint: hint.map(String::from),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::MissingCredential(var) => Some(format!("export {var}=... or add it to .env")),
            ConfigError::Io { .. } => Some("pass --config or set NEPSE_CONFIG".to_string()),
            _ => None,
        };
        Self { code: EXIT_CONFIG, message: err.to_string(), hint }
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        match err {
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => Self::config(err.to_string()),
            ReconError::UnknownSource(_) => Self::args(err.to_string())
                .with_hint("pass one --input name=FILE.csv per source, including the primary"),
            ReconError::MissingColumn { .. } => Self::args(err.to_string()),
            ReconError::Io(_) => Self::io(err.to_string()),
        }
    }
}
