//! Error types for the APM error collector.
//!
//! Capturing and merging errors never fails; the variants here cover the
//! edges of the system: loading configuration, validating user-supplied
//! attributes, and writing encoded payloads. Log sites report the stable
//! `code` and `category` alongside the message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Rejected user or agent attributes.
    Attributes,
    /// File I/O errors.
    Io,
    /// Payload serialization errors.
    Encoding,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Attributes => write!(f, "attributes"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Encoding => write!(f, "encoding"),
        }
    }
}

/// Unified error type for the collector crates.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Attribute errors (20-29)
    #[error("invalid attribute '{name}': {reason}")]
    InvalidAttribute { name: String, reason: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Attribute errors
    /// - 60-69: I/O and encoding errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::InvalidAttribute { .. } => 20,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the category for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => ErrorCategory::Config,
            Error::InvalidAttribute { .. } => ErrorCategory::Attributes,
            Error::Io(_) => ErrorCategory::Io,
            Error::Json(_) => ErrorCategory::Encoding,
        }
    }
}

/// Build an [`Error::InvalidAttribute`].
pub fn invalid_attribute(name: impl Into<String>, reason: impl Into<String>) -> Error {
    Error::InvalidAttribute {
        name: name.into(),
        reason: reason.into(),
    }
}
