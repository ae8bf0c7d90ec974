//! Error types for the scan engine protocol.

use thiserror::Error;

/// Errors that can occur when working with the scan engine protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A frame that should carry decoded text is not valid UTF-8.
    #[error("invalid UTF-8 in decoded frame")]
    InvalidUtf8,

    /// A textual command or mode name was not recognised.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
