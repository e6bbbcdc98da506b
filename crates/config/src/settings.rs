// Service settings
// Loaded from nepse.toml (see crate docs for the lookup order)

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Where a rendered page is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishKind {
    /// Keep the page in memory only (default)
    #[default]
    None,
    /// Upload to a static host over FTP
    Ftp,
    /// Write into a local directory
    Local,
}

impl PublishKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishKind::None => "none",
            PublishKind::Ftp => "ftp",
            PublishKind::Local => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Seconds between refresh passes
    pub interval_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

/// Upper bound for `fetch.max_retries`
pub const MAX_FETCH_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    /// Retries after the first attempt, for network errors, 429 and 5xx
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_retries: 3,
            user_agent: format!("nepse/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSettings {
    pub title: String,
    pub heading: String,
    pub subheading: String,
    pub credit_name: Option<String>,
    pub credit_url: Option<String>,
    /// Offset used for the "Updated on" stamp. Nepal is UTC+05:45.
    pub utc_offset_minutes: i32,
    pub file_name: String,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            title: "NEPSE Live Data".into(),
            heading: "NEPSE Data Table".into(),
            subheading: "Live share prices with 52-week range".into(),
            credit_name: None,
            credit_url: None,
            utc_offset_minutes: 345,
            file_name: "index.html".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub kind: PublishKind,

    // FTP. Only the names of the env vars live here, never the values.
    pub host_env: String,
    pub user_env: String,
    pub password_env: String,
    pub port: u16,
    pub remote_dir: String,

    // Local
    pub dir: Option<PathBuf>,

    /// Passes with a larger share of N/A cells are treated as stale
    pub max_unavailable_ratio: f64,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            kind: PublishKind::None,
            host_env: "FTP_HOST".into(),
            user_env: "FTP_USER".into(),
            password_env: "FTP_PASS".into(),
            port: 21,
            remote_dir: "/htdocs".into(),
            dir: None,
            max_unavailable_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub enabled: bool,
    pub bind: String,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:8080".into(),
        }
    }
}

impl HealthSettings {
    /// Bind address, with the port replaced by `port_override` when given.
    /// Hosting platforms hand the port over in `PORT`.
    pub fn socket_addr(&self, port_override: Option<&str>) -> Result<SocketAddr, ConfigError> {
        let mut addr: SocketAddr = self
            .bind
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("health.bind: '{}' is not host:port", self.bind)))?;
        if let Some(port) = port_override.map(str::trim).filter(|p| !p.is_empty()) {
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT: '{port}' is not a port number")))?;
            addr.set_port(port);
        }
        Ok(addr)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Reconciliation config, relative to the directory of this file
    pub recon: PathBuf,
    pub schedule: ScheduleSettings,
    pub fetch: FetchSettings,
    pub page: PageSettings,
    pub publish: PublishSettings,
    pub health: HealthSettings,

    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recon: PathBuf::from("nepse.recon.toml"),
            schedule: ScheduleSettings::default(),
            fetch: FetchSettings::default(),
            page: PageSettings::default(),
            publish: PublishSettings::default(),
            health: HealthSettings::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// Parse and validate. `base_dir` anchors relative paths.
    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: None,
            message: e.to_string().trim_end().to_string(),
        })?;
        config.base_dir = base_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn recon_path(&self) -> PathBuf {
        self.base_dir.join(&self.recon)
    }

    /// Local publish directory, anchored like `recon`.
    pub fn publish_dir(&self) -> Option<PathBuf> {
        self.publish.dir.as_ref().map(|d| self.base_dir.join(d))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.interval_secs == 0 {
            return Err(ConfigError::Invalid("schedule.interval_secs must be at least 1".into()));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be at least 1".into()));
        }
        if self.fetch.max_retries > MAX_FETCH_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "fetch.max_retries: {} is above the limit of {MAX_FETCH_RETRIES}",
                self.fetch.max_retries
            )));
        }
        // Real-world offsets span UTC-12:00 to UTC+14:00
        if !(-12 * 60..=14 * 60).contains(&self.page.utc_offset_minutes) {
            return Err(ConfigError::Invalid(format!(
                "page.utc_offset_minutes: {} is out of range",
                self.page.utc_offset_minutes
            )));
        }
        let name = &self.page.file_name;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(ConfigError::Invalid(format!(
                "page.file_name: '{name}' must be a plain file name"
            )));
        }
        let ratio = self.publish.max_unavailable_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::Invalid(format!(
                "publish.max_unavailable_ratio: {ratio} must be between 0 and 1"
            )));
        }
        match self.publish.kind {
            PublishKind::Local if self.publish.dir.is_none() => {
                return Err(ConfigError::Invalid(
                    "publish.kind = \"local\" needs publish.dir".into(),
                ));
            }
            PublishKind::Ftp if self.publish.port == 0 => {
                return Err(ConfigError::Invalid("publish.port must not be 0".into()));
            }
            _ => {}
        }
        if self.health.enabled {
            self.health.socket_addr(None)?;
        }
        Ok(())
    }
}
