//! Artifact delivery: FTP upload or a local directory.

use std::fmt;
use std::fs;
use std::io::{Cursor, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

use nepse_config::{ftp_credentials, AppConfig, ConfigError, FtpCredentials, PublishKind};

/// A rendered file ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub body: Vec<u8>,
}

impl Artifact {
    pub fn html(file_name: impl Into<String>, html: String) -> Self {
        Self {
            file_name: file_name.into(),
            body: html.into_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    Connect(String),
    Auth(String),
    Transfer(String),
    Io(String),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "connect failed: {msg}"),
            Self::Auth(msg) => write!(f, "login rejected: {msg}"),
            Self::Transfer(msg) => write!(f, "upload failed: {msg}"),
            Self::Io(msg) => write!(f, "write failed: {msg}"),
        }
    }
}

impl std::error::Error for PublishError {}

pub trait Publisher: Send + Sync {
    fn publish(&self, artifact: &Artifact) -> Result<(), PublishError>;

    /// Destination for log lines, never including credentials.
    fn describe(&self) -> String;
}

/// Build the publisher named by `[publish]`, or `None` for `kind = "none"`.
pub fn from_config(config: &AppConfig) -> Result<Option<Box<dyn Publisher>>, ConfigError> {
    match config.publish.kind {
        PublishKind::None => Ok(None),
        PublishKind::Ftp => {
            let creds = ftp_credentials(&config.publish)?;
            Ok(Some(Box::new(FtpPublisher::new(
                creds,
                config.publish.port,
                &config.publish.remote_dir,
                Duration::from_secs(config.fetch.timeout_secs),
            ))))
        }
        PublishKind::Local => {
            let dir = config
                .publish_dir()
                .ok_or_else(|| ConfigError::Invalid("publish.kind = \"local\" needs publish.dir".into()))?;
            Ok(Some(Box::new(LocalPublisher::new(dir))))
        }
    }
}

// ── FTP ─────────────────────────────────────────────────────────────

pub struct FtpPublisher {
    creds: FtpCredentials,
    port: u16,
    remote_dir: String,
    timeout: Duration,
}

impl FtpPublisher {
    pub fn new(creds: FtpCredentials, port: u16, remote_dir: &str, timeout: Duration) -> Self {
        Self {
            creds,
            port,
            remote_dir: remote_dir.to_string(),
            timeout,
        }
    }

    fn resolve(&self) -> Result<SocketAddr, PublishError> {
        (self.creds.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| PublishError::Connect(format!("{}:{}: {e}", self.creds.host, self.port)))?
            .next()
            .ok_or_else(|| {
                PublishError::Connect(format!("{}:{}: no address", self.creds.host, self.port))
            })
    }
}

fn transfer_err(e: FtpError) -> PublishError {
    PublishError::Transfer(e.to_string())
}

impl Publisher for FtpPublisher {
    fn publish(&self, artifact: &Artifact) -> Result<(), PublishError> {
        let addr = self.resolve()?;
        let mut ftp = FtpStream::connect_timeout(addr, self.timeout)
            .map_err(|e| PublishError::Connect(format!("{addr}: {e}")))?;
        ftp.get_ref()
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| PublishError::Connect(e.to_string()))?;

        ftp.login(&self.creds.user, &self.creds.password)
            .map_err(|e| PublishError::Auth(e.to_string()))?;

        let result = (|| {
            if !self.remote_dir.is_empty() {
                ftp.cwd(&self.remote_dir).map_err(transfer_err)?;
            }
            ftp.transfer_type(FileType::Binary).map_err(transfer_err)?;
            let mut reader = Cursor::new(artifact.body.as_slice());
            ftp.put_file(&artifact.file_name, &mut reader).map_err(transfer_err)
        })();

        // Best effort; the upload outcome is what matters
        if let Err(e) = ftp.quit() {
            log::debug!("ftp quit: {e}");
        }

        let bytes = result?;
        log::info!("uploaded {} ({bytes} bytes) to {}", artifact.file_name, self.describe());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("ftp://{}:{}{}", self.creds.host, self.port, self.remote_dir)
    }
}

// ── Local directory ─────────────────────────────────────────────────

/// Writes `<dir>/<file_name>` via a `.part` file and rename, so readers
/// never see a half-written page.
pub struct LocalPublisher {
    dir: PathBuf,
}

impl LocalPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Publisher for LocalPublisher {
    fn publish(&self, artifact: &Artifact) -> Result<(), PublishError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| PublishError::Io(format!("{}: {e}", self.dir.display())))?;

        let final_path = self.dir.join(&artifact.file_name);
        let part_path = self.dir.join(format!(".{}.part", artifact.file_name));

        let written = fs::File::create(&part_path).and_then(|mut f| {
            f.write_all(&artifact.body)?;
            f.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&part_path);
            return Err(PublishError::Io(format!("{}: {e}", part_path.display())));
        }

        fs::rename(&part_path, &final_path).map_err(|e| {
            let _ = fs::remove_file(&part_path);
            PublishError::Io(format!(
                "rename {} → {}: {e}",
                part_path.display(),
                final_path.display()
            ))
        })?;

        log::info!("wrote {} ({} bytes)", final_path.display(), artifact.body.len());
        Ok(())
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}
