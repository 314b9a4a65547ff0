//! Error types for hosts-redirect.
//!
//! Malformed hosts-file lines are never errors: the parser skips them and
//! reports rejected records separately. The variants here cover the failures
//! that abort a whole reload or configuration load.

use thiserror::Error;

/// Main error type for hosts-redirect.
#[derive(Error, Debug)]
pub enum RedirectError {
    /// Configuration file could not be found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}")]
    ConfigValidation { message: String },

    /// The selected hosts file exceeds the read limit.
    #[error("Hosts file {path} is too large: {size} bytes (limit {limit})")]
    HostsFileTooLarge { path: String, size: u64, limit: u64 },

    /// I/O error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watcher could not be set up.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl RedirectError {
    /// Creates a new configuration parse error.
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
        }
    }

    /// Creates a new configuration validation error.
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}

/// Result type alias using RedirectError.
pub type Result<T> = std::result::Result<T, RedirectError>;
