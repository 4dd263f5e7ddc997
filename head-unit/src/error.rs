//! Engine error taxonomy

use aa_shared::{CryptorError, TransportError, WireError};
use thiserror::Error;

/// Errors surfaced by the session engine
///
/// `Clone` so one failure can reject every waiting continuation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Protocol error: {0}")]
    Protocol(#[from] WireError),
    #[error("Handshake error: {0}")]
    Handshake(#[from] CryptorError),
    #[error("Operation aborted")]
    Aborted,
    #[error("Device error: {0}")]
    Device(String),
    #[error("Operation already in progress")]
    OperationInProgress,
    #[error("Operation timed out")]
    Timeout,
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;
