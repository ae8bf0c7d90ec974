//! Error types for the protocol engine.

use std::fmt;

use scanlink_protocol::Mode;
use thiserror::Error;

use crate::transport::TransportError;

/// Why an operation was abandoned before the device answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    Requested,
    /// The configured timeout elapsed.
    TimedOut,
    /// The engine was shut down.
    Shutdown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Requested => write!(f, "requested by caller"),
            CancelReason::TimedOut => write!(f, "timed out"),
            CancelReason::Shutdown => write!(f, "engine shut down"),
        }
    }
}

/// Errors returned by [`Engine`](crate::Engine) operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The operation is not permitted in the current mode.
    #[error("{operation} is not allowed in {mode} mode")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// Mode the engine was in.
        mode: Mode,
    },

    /// The operation was abandoned before completing.
    #[error("operation cancelled: {0}")]
    Cancelled(CancelReason),

    /// Writing to or reading from the transport failed, or the read loop
    /// has terminated.
    #[error("communication failure: {0}")]
    CommunicationFailure(String),

    /// The device sent something the engine could not interpret.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl EngineError {
    /// Whether this error is a cancellation (caller, timeout or shutdown).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled(_))
    }
}

impl From<TransportError> for EngineError {
    fn from(err: TransportError) -> Self {
        EngineError::CommunicationFailure(err.to_string())
    }
}

/// Error type of [`Engine::scan`](crate::Engine::scan).
pub type ScanError = EngineError;

/// Error type of [`Engine::set_mode`](crate::Engine::set_mode).
pub type ModeError = EngineError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
