//! Lifecycle notifications emitted by a transport session
//!
//! A transport reports exactly four kinds of notification. They are passed to
//! listeners unchanged; the payload of a message is never decoded here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four kinds of lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Open,
    Message,
    Close,
    Error,
}

impl EventKind {
    /// All event kinds, in table order
    pub const ALL: [EventKind; 4] = [Self::Open, Self::Message, Self::Close, Self::Error];

    /// Get the lowercase name of this kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message => "message",
            Self::Close => "close",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw data frame, sent or received as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Payload length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Check whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the payload as text, if this is a text frame
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

/// Close details reported by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code, when the peer sent one
    pub code: Option<u16>,
    /// Close reason, possibly empty
    pub reason: String,
}

impl CloseInfo {
    /// Close details with a code and reason
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// Close without any peer-provided details (e.g. connection lost)
    #[must_use]
    pub fn abnormal() -> Self {
        Self::default()
    }
}

/// A lifecycle notification and its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Open,
    Message(Frame),
    Close(CloseInfo),
    Error(String),
}

impl SocketEvent {
    /// The kind of this notification
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Message(_) => EventKind::Message,
            Self::Close(_) => EventKind::Close,
            Self::Error(_) => EventKind::Error,
        }
    }
}
