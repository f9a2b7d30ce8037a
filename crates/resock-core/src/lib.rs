//! # resock-core
//!
//! Connection domain: lifecycle states, socket events, retry policy, and the
//! listener registry. This crate has no dependency on any runtime or transport.

pub mod error;
pub mod events;
pub mod listeners;
pub mod retry;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use error::{SocketError, SocketResult};
pub use events::{CloseInfo, EventKind, Frame, SocketEvent};
pub use listeners::{
    invoke_all, BoxError, Listener, ListenerFailure, ListenerRegistry, ListenerTable,
};
pub use retry::{Backoff, RetryPolicy, DEFAULT_RETRY_DELAY};
pub use value_objects::{ConnectionState, SessionId};
