//! Error types for db-rowset.
//!
//! Defines the main error enum used throughout the crate, plus the
//! non-fatal warnings a result set can raise.

use std::fmt;
use thiserror::Error;

/// Main error type for result-set operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowsetError {
    /// Errors reported by the server (prepare, execute or fetch failures).
    /// Message and code are carried verbatim.
    #[error("{message} [{code}]")]
    Server { message: String, code: u32 },

    /// The caller violated a state precondition (fetching before binding,
    /// fetching an inactive result, parameter count mismatch, etc.)
    #[error("Usage error: {0}")]
    Usage(String),

    /// Handle allocation failures.
    #[error("Resource error: {0}")]
    Resource(String),

    /// A fetched value could not be converted to its host representation.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Configuration errors (invalid config file, bad script, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RowsetError {
    /// Creates a server error from the server's message and code.
    pub fn server(message: impl Into<String>, code: u32) -> Self {
        Self::Server {
            message: message.into(),
            code,
        }
    }

    /// Creates a usage error with the given message.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Creates a resource error with the given message.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Creates a conversion error with the given message.
    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the server error code, if this is a server error.
    pub fn server_code(&self) -> Option<u32> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Server { .. } => "Server Error",
            Self::Usage(_) => "Usage Error",
            Self::Resource(_) => "Resource Error",
            Self::Conversion(_) => "Conversion Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using RowsetError.
pub type Result<T> = std::result::Result<T, RowsetError>;

/// Advisory conditions that do not abort the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// A row-fetching call was used on a statement that returns no rows.
    NoResultSet,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResultSet => write!(
                f,
                "Use execute() instead of query() for statements, and also avoid fetch()"
            ),
        }
    }
}
