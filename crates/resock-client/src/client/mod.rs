//! Public socket facade

mod builder;
mod reconnecting_socket;

pub use builder::ReconnectingSocketBuilder;
pub use reconnecting_socket::ReconnectingSocket;
