//! Transport boundary
//!
//! The state machine never touches a socket directly. It asks a [`Transport`]
//! to open a session and receives the session's lifecycle notifications
//! through an [`EventSink`] tagged with that session's id.

mod sink;
mod websocket;


pub use sink::EventSink;
pub use websocket::WebSocketTransport;

use resock_core::{Frame, SocketResult};
use url::Url;

/// Parameters for opening one transport session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Validated `ws`/`wss` endpoint
    pub url: Url,
    /// Sub-protocols offered during the handshake, in preference order
    pub protocols: Vec<String>,
}

impl ConnectRequest {
    /// Create a request without sub-protocols
    pub fn new(url: Url) -> Self {
        Self {
            url,
            protocols: Vec::new(),
        }
    }

    /// Offer the given sub-protocols
    #[must_use]
    pub fn with_protocols(mut self, protocols: Vec<String>) -> Self {
        self.protocols = protocols;
        self
    }
}

/// Factory for transport sessions
///
/// `open` must return immediately. The session reports, through `sink`,
/// `Open` once usable, any number of `Message`/`Error`, and exactly one final
/// `Close`. A handshake that fails reports `Error` followed by `Close`.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, request: ConnectRequest, sink: EventSink) -> Box<dyn TransportHandle>;
}

/// Handle to one live transport session
pub trait TransportHandle: Send {
    /// Queue a frame for sending; fails unless the session is open
    fn send(&self, frame: Frame) -> SocketResult<()>;

    /// Start closing the session
    ///
    /// The final `Close` notification still arrives through the sink.
    fn close(&self);
}
