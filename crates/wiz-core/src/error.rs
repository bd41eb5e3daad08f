//! Error types for the WiZ control system
//!
//! Two families live here:
//!
//! - [`Error`]: failures that reach the caller (storage, configuration,
//!   invalid input). These are infrastructure or usage problems.
//! - [`DeviceError`]: failures talking to a single bulb. These never reach
//!   the caller; the engine turns them into a DOWN record.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for WiZ control operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the WiZ control system
#[derive(Error, Debug)]
pub enum Error {
    /// Bulb store errors (storage unavailable, write failed)
    #[error("Bulb store error: {0}")]
    Store(String),

    /// Discovery errors
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bulb not registered
    #[error("Bulb not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Background task failed to complete
    #[error("Task failed: {0}")]
    Task(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a bulb store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Classification of a single-device failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No answer within the per-call timeout
    Timeout,
    /// Connection refused, unroutable or unresolvable address
    Transport,
    /// The device answered, but not with something we understand
    Protocol,
}

/// Failure talking to one bulb
///
/// Returned by [`crate::traits::BulbDevice`] and
/// [`crate::traits::DeviceConnector`]. The engine consumes these and records
/// the bulb as DOWN; they are never surfaced to callers.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device did not answer in time
    #[error("{address}: no response within {after:?}")]
    Timeout {
        /// Device address
        address: String,
        /// Timeout that elapsed
        after: Duration,
    },

    /// Socket-level failure
    #[error("{address}: unreachable: {message}")]
    Unreachable {
        /// Device address
        address: String,
        /// Underlying transport message
        message: String,
    },

    /// Malformed or error response
    #[error("{address}: protocol error: {message}")]
    Protocol {
        /// Device address
        address: String,
        /// What was wrong with the response
        message: String,
    },
}

impl DeviceError {
    /// Create a timeout error
    pub fn timeout(address: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            address: address.into(),
            after,
        }
    }

    /// Create a transport error
    pub fn unreachable(address: impl Into<String>, message: impl ToString) -> Self {
        Self::Unreachable {
            address: address.into(),
            message: message.to_string(),
        }
    }

    /// Create a protocol error
    pub fn protocol(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Failure classification
    pub fn kind(&self) -> FailureKind {
        match self {
            DeviceError::Timeout { .. } => FailureKind::Timeout,
            DeviceError::Unreachable { .. } => FailureKind::Transport,
            DeviceError::Protocol { .. } => FailureKind::Protocol,
        }
    }

    /// Address of the device that failed
    pub fn address(&self) -> &str {
        match self {
            DeviceError::Timeout { address, .. }
            | DeviceError::Unreachable { address, .. }
            | DeviceError::Protocol { address, .. } => address,
        }
    }
}
