//! Error types for corral.
//!
//! [`PoolError`] is what callers of the pool see. [`ConnectError`] is what a
//! [`ConnectionFactory`](crate::factory::ConnectionFactory) reports when it
//! cannot produce a connection; the pool wraps it in
//! [`PoolError::ConnectFailed`] together with the endpoint it was talking to.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors surfaced by the pool manager.
#[derive(Error, Debug)]
pub enum PoolError {
    // ========================================================================
    // Borrow Errors
    // ========================================================================
    /// No idle connection is available and the capacity limits forbid
    /// creating a new one (FAIL exhaustion policy).
    #[error("Endpoint '{0}' is exhausted")]
    EndpointExhausted(String),

    /// A WAIT borrow was not served before `maxWait` elapsed.
    #[error("Timed out after {waited:?} waiting for a connection to '{endpoint}'")]
    BorrowTimeout {
        /// Endpoint the caller was waiting on
        endpoint: String,
        /// How long the caller waited
        waited: Duration,
    },

    /// The factory could not create a usable connection.
    #[error("Failed to connect to '{endpoint}': {source}")]
    ConnectFailed {
        /// Endpoint the connection was for
        endpoint: String,
        /// Underlying factory error
        #[source]
        source: ConnectError,
    },

    /// The endpoint was removed while the caller was waiting on it.
    #[error("Endpoint '{0}' was removed from the pool")]
    EndpointRemoved(String),

    /// The caller cancelled a pending borrow.
    #[error("Borrow from '{0}' was cancelled")]
    Cancelled(String),

    /// The pool has been closed.
    #[error("Connection pool is closed")]
    Closed,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A configuration value is invalid.
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// An endpoint address could not be parsed.
    #[error("Invalid endpoint address: {0}")]
    InvalidEndpoint(String),

    /// A configuration file could not be read or parsed.
    #[error("Failed to load pool configuration from '{path}': {message}")]
    ConfigLoad {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message
        message: String,
    },
}

impl PoolError {
    /// Whether the caller may reasonably retry the same borrow.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            PoolError::BorrowTimeout { .. } | PoolError::ConnectFailed { .. }
        )
    }

    pub(crate) fn config_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PoolError::ConfigLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Errors a connection factory reports while creating connections.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// I/O error while connecting.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection attempt did not complete in time.
    #[error("Connection timeout after {0:?}")]
    Timeout(Duration),

    /// The endpoint refused the connection or its handshake.
    #[error("Connection refused: {0}")]
    Refused(String),

    /// Freshly obtained connections kept failing validation.
    #[error("Connection failed validation {attempts} times in a row")]
    ValidationFailed {
        /// Consecutive failed validations
        attempts: u32,
    },

    /// Any other factory failure.
    #[error("{0}")]
    Other(String),
}
