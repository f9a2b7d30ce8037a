//! Socket errors - failures reported to callers of the connection layer

use thiserror::Error;

use crate::value_objects::ConnectionState;

/// Errors reported by socket operations
///
/// None of these change the connection state; they are returned to the caller
/// or logged.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Cannot send while {state}: socket is not connected")]
    SendWhileDisconnected { state: ConnectionState },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl SocketError {
    /// Get an error code string for logs and diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            Self::SendWhileDisconnected { .. } => "SEND_WHILE_DISCONNECTED",
            Self::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    /// Check if this error was caused by calling an operation in the wrong state
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::SendWhileDisconnected { .. })
    }
}

/// Result type for socket operations
pub type SocketResult<T> = Result<T, SocketError>;
