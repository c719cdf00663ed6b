//! Store Errors
//!
//! `TigerStyle`: Explicit error types with context.
//!
//! One variant per failure class of the persistence protocol: connect,
//! resolve schema, serialize, write, release. `Cleanup` is special: it is
//! logged by the caller and never propagated.

use thiserror::Error;

/// Errors from persistence operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Target store unreachable or credentials rejected
    #[error("connection error: {message}")]
    Connection {
        /// Connection error message
        message: String,
    },

    /// Table lookup or creation failure
    #[error("schema error: {message}")]
    Schema {
        /// Schema error message
        message: String,
    },

    /// Malformed metadata text or unsupported image encoding
    #[error("serialization error: {message}")]
    Serialization {
        /// Serialization error message
        message: String,
    },

    /// Insert or upsert failure, including partial-batch failure
    #[error("write error: {message}")]
    Write {
        /// Write error message
        message: String,
    },

    /// Temp resource not released; logged, never fatal
    #[error("cleanup error: {message}")]
    Cleanup {
        /// Cleanup error message
        message: String,
    },

    /// Missing or invalid configuration field
    #[error("config error: {message}")]
    Config {
        /// Config error message
        message: String,
    },
}

impl StoreError {
    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a schema error.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a write error.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }

    /// Create a cleanup error.
    #[must_use]
    pub fn cleanup(message: impl Into<String>) -> Self {
        Self::Cleanup {
            message: message.into(),
        }
    }

    /// Create a config error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this is a transient error (worth retrying on a later event).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if this error must never abort the caller.
    #[must_use]
    pub fn is_cleanup(&self) -> bool {
        matches!(self, Self::Cleanup { .. })
    }
}

/// Result type for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;
