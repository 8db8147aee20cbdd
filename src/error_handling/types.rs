use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadValue(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadValue(e) => write!(f, "Invalid value: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Events the correlator refuses. Never fatal for the capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    UnknownMessage,
    SessionClosed(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnknownMessage => write!(f, "Unparseable message reached the correlator"),
            SessionError::SessionClosed(id) => write!(f, "Session {} is already closed", id),
        }
    }
}

impl std::error::Error for SessionError {}

/// Failure to render a single message. Replaced by a fallback record by the serializer.
#[derive(Debug)]
pub enum ExportError {
    Encoding(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Encoding(e) => write!(f, "Encoding error: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

#[derive(Debug)]
pub enum StorageError {
    WriteFailed(String),
    ReadFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            StorageError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

/// Failures at the capture boundary: opening the event source or writing the export.
#[derive(Debug)]
pub enum CaptureError {
    Io(std::io::Error),
    Storage(StorageError),
    Config(ConfigError),
    /// One line of a recorded event stream could not be decoded. Skipped by the run loop.
    MalformedEvent { line: usize, reason: String },
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Io(e) => write!(f, "Capture source error: {}", e),
            CaptureError::Storage(e) => write!(f, "Capture storage error: {}", e),
            CaptureError::Config(e) => write!(f, "Capture configuration error: {}", e),
            CaptureError::MalformedEvent { line, reason } => {
                write!(f, "Malformed event on line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

impl From<StorageError> for CaptureError {
    fn from(err: StorageError) -> Self {
        CaptureError::Storage(err)
    }
}

impl From<ConfigError> for CaptureError {
    fn from(err: ConfigError) -> Self {
        CaptureError::Config(err)
    }
}
