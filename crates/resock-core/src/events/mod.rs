//! Socket events - lifecycle notifications delivered to listeners

mod socket_event;

pub use socket_event::{CloseInfo, EventKind, Frame, SocketEvent};
