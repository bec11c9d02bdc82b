//! Error types for feedpipe
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for feedpipe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for feedpipe
#[derive(Error, Debug)]
pub enum Error {
    /// A value could not be converted to canonical text
    #[error("Field {key} is not unicode-compatible ({value})")]
    Encoding {
        /// Field being written
        key: String,
        /// Debug rendering of the rejected value
        value: String,
    },

    /// `url` or `title` was assigned a value that is not text
    #[error("Tried to set {field} to {value}")]
    InvalidField {
        /// Field being written
        field: String,
        /// Debug rendering of the rejected value
        value: String,
    },

    /// Read of a missing field without a default
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Malformed bulk update call
    #[error("Invalid arguments: {0}")]
    Argument(String),

    /// Dotted path or callable lookup failed during mapped population
    #[error("Unable to populate field {field}: {reason}")]
    PathResolution {
        /// Target field in the entry
        field: String,
        /// What went wrong
        reason: String,
    },

    /// Template rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// A value had the wrong type for the requested operation
    #[error("Type error: {0}")]
    Type(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task runner failures
    #[error("Runner error ({runner}): {message}")]
    Runner {
        /// Runner name
        runner: String,
        /// Error message
        message: String,
    },

    /// The daemon is not running or stopped answering
    #[error("Daemon unavailable: {0}")]
    DaemonUnavailable(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an encoding error
    pub fn encoding(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Encoding {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create an invalid field error
    pub fn invalid_field(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a "key not found" error
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound(key.into())
    }

    /// Create an argument error
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    /// Create a path resolution error
    pub fn path_resolution(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathResolution {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a render error
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Create a type error
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a runner error
    pub fn runner(runner: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runner {
            runner: runner.into(),
            message: message.into(),
        }
    }

    /// Create a daemon-unavailable error
    pub fn daemon_unavailable(msg: impl Into<String>) -> Self {
        Self::DaemonUnavailable(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
