use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while resolving settings for the active plugin.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no plugin settings for '{0}' (add it under \"plugins\")")]
    UnknownTarget(String),

    #[error("missing setting '{0}'")]
    MissingSetting(String),

    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("cannot derive a plugin name from '{0}': it has no parent directory")]
    NoPluginName(String),

    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse settings {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A command could not be delivered to Maya.
#[derive(Debug, Error)]
#[error("Failed to communicate with Maya ({host}:{port}):\n{source}")]
pub struct TransmissionError {
    pub host: String,
    pub port: u16,
    #[source]
    pub source: io::Error,
}

impl TransmissionError {
    pub fn new(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        Self {
            host: host.into(),
            port,
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.source.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        )
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unsupported platform: {0} (expected linux or windows)")]
    UnsupportedPlatform(String),

    #[error(transparent)]
    Transmission(#[from] TransmissionError),
}

pub type Result<T> = std::result::Result<T, Error>;
