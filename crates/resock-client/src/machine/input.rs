//! Inputs consumed by a socket's driver task

use resock_core::{SessionId, SocketEvent};

use crate::retry::TimerToken;

/// Something the state machine must react to, in arrival order
#[derive(Debug)]
pub enum Input {
    /// A notification from a transport session
    Transport {
        session_id: SessionId,
        event: SocketEvent,
    },
    /// A scheduled retry delay has elapsed
    RetryElapsed(TimerToken),
}
