//! Error types for linescout.
//!
//! Errors fall into two groups. Fatal errors end a run and surface to the
//! caller as `Err`: an invalid root path, an aborted traversal, a bad pattern
//! or a bad configuration. Per-entry problems (an unreadable directory, a file
//! that disappears between discovery and scanning) are logged and counted by
//! the component that hits them and never reach this type's callers.
//!
//! ```rust,ignore
//! match linescout::search(&config) {
//!     Ok(output) => report(output),
//!     Err(ScanError::InvalidRoot(path)) => eprintln!("no such path: {}", path.display()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur during a scan
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid root path: {0}")]
    InvalidRoot(PathBuf),
    #[error("Traversal aborted at {path}: {message}")]
    TraversalAborted { path: PathBuf, message: String },
    #[error("File queue closed before traversal finished")]
    QueueClosed,
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScanError {
    pub fn invalid_root(path: impl Into<PathBuf>) -> Self {
        Self::InvalidRoot(path.into())
    }

    pub fn traversal_aborted(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TraversalAborted {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn worker_pool(msg: impl Into<String>) -> Self {
        Self::WorkerPool(msg.into())
    }

    /// Maps an IO error from opening or reading `path` to the matching variant.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// The path a fatal walk error names, if it is one.
    pub fn bad_path(&self) -> Option<&Path> {
        match self {
            Self::InvalidRoot(path) | Self::TraversalAborted { path, .. } => Some(path),
            _ => None,
        }
    }
}
