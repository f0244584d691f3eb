use std::io;
use thiserror::Error;

/// Errors raised by metric providers and platform lookups.
///
/// None of these ever escape `TelemetryCollector::collect_all`; they are
/// absorbed at the adapter or per-item boundary and turned into log lines.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("IO error: {0}")]
    Io(io::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not supported on this platform: {0}")]
    Unsupported(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Registry error: {0}")]
    Registry(String),
}

/// Result type alias for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

impl From<io::Error> for TelemetryError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            TelemetryError::PermissionDenied(err.to_string())
        } else {
            TelemetryError::Io(err)
        }
    }
}

impl TelemetryError {
    pub fn permission_denied<S: Into<String>>(msg: S) -> Self {
        TelemetryError::PermissionDenied(msg.into())
    }

    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Unsupported(msg.into())
    }

    pub fn provider<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Provider(msg.into())
    }

    pub fn registry<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Registry(msg.into())
    }

    /// True for failures caused by missing access rights
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, TelemetryError::PermissionDenied(_))
    }
}
