//! Client error types
//!
//! Unified error handling for applications embedding the client.

use crate::config::ConfigError;
use crate::telemetry::TracingError;
use resock_core::SocketError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    // Construction errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Connection errors
    #[error(transparent)]
    Socket(#[from] SocketError),

    // Environment errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tracing(#[from] TracingError),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl ClientError {
    /// Get error code for logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Socket(e) => e.code(),
            Self::Io(_) => "IO_ERROR",
            Self::Tracing(_) => "TRACING_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if the error should stop the process
    ///
    /// Socket errors are recoverable: the connection keeps retrying.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Socket(_) | Self::Tracing(_))
    }

    /// Process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 78, // EX_CONFIG
            Self::Io(_) => 74,     // EX_IOERR
            _ => 1,
        }
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
