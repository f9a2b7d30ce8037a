//! Connection lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a reconnecting socket
///
/// `Connecting` and `Connected` always have a live transport session behind
/// them; `Closed` and `Disconnected` never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// A transport session is being opened
    #[default]
    Connecting,
    /// The transport reported open
    Connected,
    /// The transport closed on its own; a retry may be pending
    Closed,
    /// The user called `disconnect()`; no retry until `connect()`
    Disconnected,
}

impl ConnectionState {
    /// Get the lowercase name of this state
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
            Self::Disconnected => "disconnected",
        }
    }

    /// Check whether a live transport session backs this state
    #[must_use]
    pub const fn has_session(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Check whether frames can be sent in this state
    #[must_use]
    pub const fn can_send(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
