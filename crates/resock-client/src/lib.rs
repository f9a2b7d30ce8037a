//! # resock-client
//!
//! WebSocket client that reconnects on its own after the connection drops.
//!
//! A [`ReconnectingSocket`] owns at most one transport session at a time and
//! exposes its lifecycle as a small state machine:
//!
//! ```text
//! connecting -> connected -> closed -> (retry delay) -> connecting
//!      \             \          \
//!       `-------------`----------`--> disconnected (user) -> connect()
//! ```

pub mod client;
mod machine;
mod retry;
pub mod transport;

pub use client::{ReconnectingSocket, ReconnectingSocketBuilder};
pub use transport::{ConnectRequest, EventSink, Transport, TransportHandle, WebSocketTransport};

// Re-export the domain types callers need to register listeners
pub use resock_core::{
    CloseInfo, ConnectionState, EventKind, Frame, Listener, ListenerTable, SessionId,
    SocketError, SocketEvent, SocketResult,
};
