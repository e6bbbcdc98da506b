//! HTTP fetching with retry, backoff, and status classification.

use std::thread;
use std::time::Duration;

use nepse_config::{FetchSettings, MAX_FETCH_RETRIES};
use nepse_recon::config::SourceConfig;
use nepse_recon::SourceRecord;

use super::table::extract_table;
use super::{ScrapeError, SourceFetcher};

// ── FetchClient ─────────────────────────────────────────────────────

/// Longest single wait between attempts, including `Retry-After`.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Blocking HTTP client shared by every source of a pass.
///
/// Network errors, 429 and 5xx are retried with exponential backoff
/// (`Retry-After` wins for 429). Every wait is clamped to the backoff cap.
/// Any other non-success status fails immediately.
pub struct FetchClient {
    http: reqwest::blocking::Client,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl FetchClient {
    pub fn new(settings: &FetchSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            max_retries: settings.max_retries.min(MAX_FETCH_RETRIES),
            initial_backoff: Duration::from_secs(1),
            max_backoff: MAX_BACKOFF,
        })
    }

    /// Override the first retry delay (doubles on every retry).
    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }

    pub fn with_max_backoff(mut self, cap: Duration) -> Self {
        self.max_backoff = cap;
        self
    }

    /// GET `url` and return the body text.
    pub fn get_text(&self, source: &str, url: &str) -> Result<String, ScrapeError> {
        let mut backoff = self.initial_backoff.min(self.max_backoff);
        let mut attempt = 0;

        loop {
            let last = attempt == self.max_retries;

            let wait = match self.http.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if resp.status().is_success() {
                        return resp.text().map_err(|e| ScrapeError::Network {
                            source: source.to_string(),
                            message: format!("failed to read response body: {e}"),
                        });
                    }

                    let retryable = status == 429 || status >= 500;
                    if !retryable || last {
                        return Err(ScrapeError::Status {
                            source: source.to_string(),
                            status,
                        });
                    }

                    let wait = if status == 429 {
                        resp.headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.trim().parse::<u64>().ok())
                            .map(|secs| Duration::from_secs(secs).min(self.max_backoff))
                            .unwrap_or(backoff)
                    } else {
                        backoff
                    };
                    log::warn!(
                        "{source}: retry {}/{} in {:?} (HTTP {status})",
                        attempt + 1,
                        self.max_retries,
                        wait,
                    );
                    wait
                }
                Err(e) => {
                    if last {
                        return Err(ScrapeError::Network {
                            source: source.to_string(),
                            message: format!("{e} (after {} attempts)", attempt + 1),
                        });
                    }
                    log::warn!(
                        "{source}: retry {}/{} in {:?} ({e})",
                        attempt + 1,
                        self.max_retries,
                        backoff,
                    );
                    backoff
                }
            };

            thread::sleep(wait);
            backoff = backoff.saturating_mul(2).min(self.max_backoff);
            attempt += 1;
        }
    }
}

// ── HttpScraper ─────────────────────────────────────────────────────

/// Fetches each source's `url` and extracts its `table`.
pub struct HttpScraper {
    client: FetchClient,
}

impl HttpScraper {
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }
}

impl SourceFetcher for HttpScraper {
    fn fetch(&self, name: &str, source: &SourceConfig) -> Result<Vec<SourceRecord>, ScrapeError> {
        let url = source.url.as_deref().ok_or_else(|| ScrapeError::NoUrl {
            source: name.to_string(),
        })?;
        log::debug!("fetching '{name}' from {url}");
        let body = self.client.get_text(name, url)?;
        extract_table(name, &body, source)
    }
}
