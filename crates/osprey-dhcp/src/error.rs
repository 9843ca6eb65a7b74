//! Error types for the lease engine.

use thiserror::Error;

/// Error type for lease operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DhcpError {
    /// Every pool address is currently leased
    #[error("address pool exhausted")]
    PoolExhausted,

    /// The decoded message is missing a required field
    #[error("unusable lease message: {0}")]
    MalformedMessage(String),
}

/// Result type for lease operations.
pub type Result<T> = std::result::Result<T, DhcpError>;
