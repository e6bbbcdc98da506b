// FTP credentials
//
// Values are read from environment variables whose names come from the
// [publish] section. A `.env` file loaded at startup feeds the same lookup.
// Credentials are never stored in nepse.toml.

use std::env;
use std::fmt;

use crate::settings::PublishSettings;
use crate::ConfigError;

#[derive(Clone, PartialEq, Eq)]
pub struct FtpCredentials {
    pub host: String,
    pub user: String,
    pub password: String,
}

// Keep the password out of logs and panics
impl fmt::Debug for FtpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpCredentials")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolve credentials from the process environment.
pub fn ftp_credentials(publish: &PublishSettings) -> Result<FtpCredentials, ConfigError> {
    ftp_credentials_with(publish, |name| env::var(name).ok())
}

/// Resolve credentials through `lookup`, which maps an env var name to its
/// value. Empty values count as unset.
pub fn ftp_credentials_with<F>(publish: &PublishSettings, lookup: F) -> Result<FtpCredentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| {
        lookup(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential(name.to_string()))
    };

    Ok(FtpCredentials {
        host: read(&publish.host_env)?,
        user: read(&publish.user_env)?,
        password: read(&publish.password_env)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_reads_named_vars() {
        let env = vars(&[("FTP_HOST", "ftp.example.com"), ("FTP_USER", "board"), ("FTP_PASS", "s3cret")]);
        let creds = ftp_credentials_with(&PublishSettings::default(), |k| env.get(k).cloned()).unwrap();
        assert_eq!(creds.host, "ftp.example.com");
        assert_eq!(creds.user, "board");
        assert_eq!(creds.password, "s3cret");
    }

    #[test]
    fn test_custom_names() {
        let publish = PublishSettings {
            host_env: "BOARD_HOST".into(),
            ..PublishSettings::default()
        };
        let env = vars(&[("BOARD_HOST", "h"), ("FTP_USER", "u"), ("FTP_PASS", "p")]);
        let creds = ftp_credentials_with(&publish, |k| env.get(k).cloned()).unwrap();
        assert_eq!(creds.host, "h");
    }

    #[test]
    fn test_missing_or_empty_var() {
        let env = vars(&[("FTP_HOST", "h"), ("FTP_USER", "")]);
        let err = ftp_credentials_with(&PublishSettings::default(), |k| env.get(k).cloned()).unwrap_err();
        assert_eq!(err, ConfigError::MissingCredential("FTP_USER".into()));
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = FtpCredentials {
            host: "h".into(),
            user: "u".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
    }
}
