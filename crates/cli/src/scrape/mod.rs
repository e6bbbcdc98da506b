//! Source tables from the web.
//!
//! Every source named in the reconciliation config is fetched through a
//! [`SourceFetcher`]. A failed source never aborts the pass: its error is
//! logged and it contributes an empty table, so downstream it reads as
//! "ticker not found" for secondaries and as a stale pass for the primary.

pub mod http;
pub mod table;

use std::fmt;

use nepse_recon::config::{ReconConfig, SourceConfig};
use nepse_recon::{ReconInput, SourceRecord};

pub use http::{FetchClient, HttpScraper};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    /// Connection/timeout failure, or retries exhausted.
    Network { source: String, message: String },
    /// Non-success HTTP status that is not retried.
    Status { source: String, status: u16 },
    /// The source has no `url` to fetch.
    NoUrl { source: String },
    BadSelector { source: String, selector: String },
    TableNotFound { source: String, selector: String },
    /// The table has neither a `thead` nor a first row to read headers from.
    NoHeader { source: String },
    /// The symbol column is not among the table headers.
    MissingColumn { source: String, column: String },
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { source, message } => write!(f, "{source}: {message}"),
            Self::Status { source, status } => write!(f, "{source}: HTTP {status}"),
            Self::NoUrl { source } => write!(f, "{source}: no url configured"),
            Self::BadSelector { source, selector } => {
                write!(f, "{source}: invalid table selector {selector:?}")
            }
            Self::TableNotFound { source, selector } => {
                write!(f, "{source}: no element matches {selector:?}")
            }
            Self::NoHeader { source } => write!(f, "{source}: table has no header row"),
            Self::MissingColumn { source, column } => {
                write!(f, "{source}: table has no '{column}' column")
            }
        }
    }
}

impl std::error::Error for ScrapeError {}

impl ScrapeError {
    /// Name of the source that failed.
    pub fn source_name(&self) -> &str {
        match self {
            Self::Network { source, .. }
            | Self::Status { source, .. }
            | Self::NoUrl { source }
            | Self::BadSelector { source, .. }
            | Self::TableNotFound { source, .. }
            | Self::NoHeader { source }
            | Self::MissingColumn { source, .. } => source,
        }
    }
}

/// Produces the rows of one configured source.
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, name: &str, source: &SourceConfig) -> Result<Vec<SourceRecord>, ScrapeError>;
}

/// Tables for one pass plus the sources that failed.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub input: ReconInput,
    pub errors: Vec<ScrapeError>,
}

/// Fetch every source in `config`, primary first.
pub fn scrape_all(fetcher: &dyn SourceFetcher, config: &ReconConfig) -> ScrapeReport {
    let mut report = ScrapeReport::default();

    for name in config.source_order() {
        let Some(source) = config.sources.get(name) else {
            continue;
        };
        let rows = match fetcher.fetch(name, source) {
            Ok(rows) => {
                log::info!("scraped {} rows from '{name}'", rows.len());
                rows
            }
            Err(e) => {
                log::error!("scrape failed: {e}");
                report.errors.push(e);
                Vec::new()
            }
        };
        report.input.records.insert(name.to_string(), rows);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned;

    impl SourceFetcher for Canned {
        fn fetch(&self, name: &str, _source: &SourceConfig) -> Result<Vec<SourceRecord>, ScrapeError> {
            match name {
                "live" => Ok(vec![SourceRecord::new("ABC").with("LTP", "100")]),
                _ => Err(ScrapeError::Status { source: name.into(), status: 503 }),
            }
        }
    }

    fn config() -> ReconConfig {
        ReconConfig::from_toml(
            r#"
name = "t"
primary = "live"
secondaries = ["w52"]

[sources.live]
symbol_column = "Symbol"
columns = [{ header = "LTP" }]

[sources.w52]
symbol_column = "Symbol"
columns = [{ header = "High" }]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_failed_source_becomes_empty_table() {
        let report = scrape_all(&Canned, &config());
        assert_eq!(report.input.records["live"].len(), 1);
        assert!(report.input.records["w52"].is_empty());
        assert_eq!(
            report.errors,
            vec![ScrapeError::Status { source: "w52".into(), status: 503 }]
        );
    }

    #[test]
    fn test_error_messages_name_the_source() {
        let err = ScrapeError::TableNotFound { source: "live".into(), selector: "table#x".into() };
        assert_eq!(err.to_string(), "live: no element matches \"table#x\"");
    }
}
