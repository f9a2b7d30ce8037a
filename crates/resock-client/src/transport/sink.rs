//! Notification sink handed to transport sessions

use resock_core::{SessionId, SocketEvent};
use tokio::sync::mpsc;

use crate::machine::Input;

/// Delivers one session's notifications to its socket's driver
#[derive(Debug, Clone)]
pub struct EventSink {
    session_id: SessionId,
    inputs: mpsc::UnboundedSender<Input>,
}

impl EventSink {
    pub(crate) fn new(session_id: SessionId, inputs: mpsc::UnboundedSender<Input>) -> Self {
        Self { session_id, inputs }
    }

    /// Session this sink reports for
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Report a notification
    ///
    /// Returns `false` once the owning socket has been dropped.
    pub fn emit(&self, event: SocketEvent) -> bool {
        self.inputs
            .send(Input::Transport {
                session_id: self.session_id,
                event,
            })
            .is_ok()
    }
}
