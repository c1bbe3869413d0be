//! Error types for the Lighthouse reconciler
//!
//! Two kinds of failure live here. Expected validation rejections
//! ([`InvalidNameError`], [`SchemaError`]) are plain typed values returned by
//! the validator traits and end in quarantine. Everything else is an
//! [`Error`] variant.

use thiserror::Error;

/// Result type alias for Lighthouse operations
pub type Result<T> = std::result::Result<T, Error>;

/// A claim name contains characters the registry URI scheme does not allow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid name {name:?}: {reason}")]
pub struct InvalidNameError {
    /// The rejected name
    pub name: String,
    /// Why it was rejected
    pub reason: String,
}

impl InvalidNameError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A resolved metadata payload was rejected by the schema validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("schema violation: {0}")]
pub struct SchemaError(pub String);

impl SchemaError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Core error type for the reconciler
#[derive(Error, Debug)]
pub enum Error {
    /// Listing the registry failed; the whole cycle is skipped
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// Resolving a single name failed
    #[error("Resolve failed for {name}: {message}")]
    Resolve {
        /// Name that was being resolved
        name: String,
        /// Error message
        message: String,
    },

    /// Writing or reading the cache snapshot failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A registry call exceeded its time budget
    #[error("Timed out after {secs}s: {operation}")]
    Timeout {
        /// The call that timed out
        operation: String,
        /// Budget in seconds
        secs: u64,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a registry-unavailable error
    pub fn registry_unavailable(msg: impl Into<String>) -> Self {
        Self::RegistryUnavailable(msg.into())
    }

    /// Create a resolve error
    pub fn resolve(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            secs,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
