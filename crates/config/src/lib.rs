//! Service settings for the `nepse` binary.
//!
//! Lookup order for `nepse.toml`:
//! 1. an explicit path (`--config` / `NEPSE_CONFIG`)
//! 2. `./nepse.toml`
//! 3. `<config dir>/nepse/nepse.toml`
//! 4. built-in defaults

pub mod credentials;
pub mod settings;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub use credentials::{ftp_credentials, FtpCredentials};
pub use settings::{
    AppConfig, FetchSettings, HealthSettings, PageSettings, PublishKind, PublishSettings,
    ScheduleSettings, MAX_FETCH_RETRIES,
};

pub const CONFIG_FILE_NAME: &str = "nepse.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Parse { path: Option<PathBuf>, message: String },
    Invalid(String),
    MissingCredential(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "cannot read {}: {}", path.display(), message)
            }
            ConfigError::Parse { path: Some(path), message } => {
                write!(f, "invalid TOML in {}: {}", path.display(), message)
            }
            ConfigError::Parse { path: None, message } => write!(f, "invalid TOML: {message}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
            ConfigError::MissingCredential(var) => {
                write!(f, "environment variable {var} is not set")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where the active config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// Per-user config path (~/.config/nepse/nepse.toml on Linux)
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("nepse").join(CONFIG_FILE_NAME))
}

/// Load one file. Relative paths inside it resolve against its directory.
pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    AppConfig::from_toml_str(&text, base_dir).map_err(|e| match e {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            path: Some(path.to_path_buf()),
            message,
        },
        other => other,
    })
}

/// Pick a config file per the lookup order and load it.
///
/// An explicit path must exist. The implicit candidates are skipped when
/// absent; if none exists the defaults are used, anchored at `cwd`.
pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Result<(AppConfig, ConfigSource), ConfigError> {
    if let Some(path) = explicit {
        return load(path).map(|c| (c, ConfigSource::File(path.to_path_buf())));
    }

    let candidates = std::iter::once(cwd.join(CONFIG_FILE_NAME)).chain(user_config_path());
    for candidate in candidates {
        if candidate.is_file() {
            log::debug!("using config {}", candidate.display());
            return load(&candidate).map(|c| (c, ConfigSource::File(candidate)));
        }
    }

    log::debug!("no {CONFIG_FILE_NAME} found, using defaults");
    let config = AppConfig {
        base_dir: cwd.to_path_buf(),
        ..AppConfig::default()
    };
    Ok((config, ConfigSource::Defaults))
}
