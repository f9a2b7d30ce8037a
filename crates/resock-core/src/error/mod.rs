//! Error types for the connection layer

mod socket_error;

pub use socket_error::{SocketError, SocketResult};
