//! Common error types used throughout pinforge.
//!
//! Filesystem failures are fatal for the phase in which they occur. Backend
//! failures and timeouts are fatal for the whole run.

use std::path::PathBuf;
use std::time::Duration;

/// Common error type for pinforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required directory does not exist.
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Two media files share a base name and would stage the same record.
    #[error("Duplicate asset base name '{base_name}': {first} and {second}")]
    DuplicateAsset {
        base_name: String,
        first: String,
        second: String,
    },

    /// The pinning backend rejected the request or could not be reached.
    #[error("Backend error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Backend {
        status: Option<u16>,
        message: String,
    },

    /// A backend call exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a new Backend error with an optional HTTP status.
    pub fn backend<S: Into<String>>(status: Option<u16>, msg: S) -> Self {
        Self::Backend {
            status,
            message: msg.into(),
        }
    }

    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Timeout error.
    pub fn timeout<S: Into<String>>(operation: S, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Whether repeating the same backend call may succeed.
    ///
    /// Transport failures (no status), rate limiting and server errors are
    /// retryable; everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend { status: None, .. } => true,
            Self::Backend {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
