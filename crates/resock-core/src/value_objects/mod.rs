//! Value objects - small immutable types shared across the connection layer

mod connection_state;
mod session_id;

pub use connection_state::ConnectionState;
pub use session_id::SessionId;
