//! Error types for the buildwatch system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for buildwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the buildwatch system
#[derive(Error, Debug)]
pub enum Error {
    /// Master data-source errors (master unreachable, listing failed)
    #[error("master source error: {0}")]
    Source(String),

    /// Build cache errors
    #[error("build cache error: {0}")]
    Cache(String),

    /// Event sink errors
    #[error("event sink error: {0}")]
    Sink(String),

    /// Instance-health oracle errors
    #[error("health oracle error: {0}")]
    Health(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors (cache file access, sockets)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from master or sink endpoints)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Master-scoped error with context
    #[error("master error ({master}): {message}")]
    Master {
        /// Master identifier
        master: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a master data-source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a build cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create an event sink error
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Create a health oracle error
    pub fn health(msg: impl Into<String>) -> Self {
        Self::Health(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a master-scoped error
    pub fn master(master: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Master {
            master: master.into(),
            message: message.into(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
