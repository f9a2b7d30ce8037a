//! Connection state machine
//!
//! The machine is plain synchronous state. It is driven from two sides: user
//! calls (`connect`, `disconnect`, `send`) and [`Input`]s applied by the
//! driver task in arrival order. It never calls listeners itself; `handle`
//! returns the event that should be dispatched once the caller has released
//! its lock.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use resock_core::{ConnectionState, Frame, SessionId, SocketError, SocketEvent, SocketResult};
use tokio::sync::mpsc;

use super::Input;
use crate::retry::RetryController;
use crate::transport::{ConnectRequest, EventSink, Transport, TransportHandle};

/// The live transport session
struct Session {
    id: SessionId,
    handle: Box<dyn TransportHandle>,
}

/// Lifecycle state plus the resources that back it
///
/// Invariant: `session` is `Some` exactly when `state` is `Connecting` or
/// `Connected`.
pub struct ConnectionMachine {
    state: ConnectionState,
    request: ConnectRequest,
    transport: Arc<dyn Transport>,
    inputs: mpsc::UnboundedSender<Input>,
    session: Option<Session>,
    /// Sessions closed by the user whose final `Close` has not arrived yet
    draining: HashSet<SessionId>,
    retry: RetryController,
    /// Retries scheduled since the last successful open
    attempt: u32,
    exhausted: bool,
    reconnect_automatically: bool,
}

impl ConnectionMachine {
    /// Create the machine and open the first session
    pub fn start(
        request: ConnectRequest,
        transport: Arc<dyn Transport>,
        retry: RetryController,
        reconnect_automatically: bool,
        inputs: mpsc::UnboundedSender<Input>,
    ) -> Self {
        let mut machine = Self {
            state: ConnectionState::Connecting,
            request,
            transport,
            inputs,
            session: None,
            draining: HashSet::new(),
            retry,
            attempt: 0,
            exhausted: false,
            reconnect_automatically,
        };
        machine.open_session();
        machine
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Id of the live session, if any
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Check whether the attempt limit stopped automatic reconnection
    pub fn retries_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Check whether a retry is scheduled
    pub fn retry_pending(&self) -> bool {
        self.retry.is_pending()
    }

    /// Start connecting unless a session is already live
    ///
    /// From `Closed` the pending retry is dropped and the attempt count starts
    /// over. Returns whether a new session was opened.
    pub fn connect(&mut self) -> bool {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                tracing::trace!(state = %self.state, "connect() ignored");
                false
            }
            ConnectionState::Closed | ConnectionState::Disconnected => {
                self.retry.cancel();
                self.attempt = 0;
                self.exhausted = false;
                self.open_session();
                true
            }
        }
    }

    /// Enter `Disconnected`, closing the live session and any pending retry
    ///
    /// The closed session's final `Close` will still be reported by `handle`
    /// but no longer drives a transition. Returns whether the state changed.
    pub fn disconnect(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }

        self.retry.cancel();
        self.exhausted = false;
        if let Some(session) = self.session.take() {
            self.draining.insert(session.id);
            session.handle.close();
        }

        tracing::info!(from = %self.state, "Disconnected by user");
        self.state = ConnectionState::Disconnected;
        true
    }

    /// Send a frame through the live session
    pub fn send(&self, frame: Frame) -> SocketResult<()> {
        match &self.session {
            Some(session) if self.state.can_send() => {
                tracing::trace!(session_id = %session.id, len = frame.len(), "Sending frame");
                session.handle.send(frame)
            }
            _ => Err(SocketError::SendWhileDisconnected { state: self.state }),
        }
    }

    /// Apply one input
    ///
    /// Returns the event to hand to listeners, if any.
    pub fn handle(&mut self, input: Input) -> Option<SocketEvent> {
        match input {
            Input::Transport { session_id, event } => self.on_transport(session_id, event),
            Input::RetryElapsed(token) => {
                if self.retry.fire(token) && self.state == ConnectionState::Closed {
                    tracing::debug!(attempt = self.attempt, "Retry delay elapsed");
                    self.open_session();
                }
                None
            }
        }
    }

    /// Close the live session and stop retrying without changing state
    pub fn shutdown(&mut self) {
        self.retry.cancel();
        if let Some(session) = self.session.take() {
            session.handle.close();
        }
    }

    fn on_transport(&mut self, session_id: SessionId, event: SocketEvent) -> Option<SocketEvent> {
        if self.session_id() != Some(session_id) {
            return self.on_stale(session_id, event);
        }

        match &event {
            SocketEvent::Open => {
                tracing::info!(session_id = %session_id, url = %self.request.url, "Connected");
                self.state = ConnectionState::Connected;
                self.attempt = 0;
                self.exhausted = false;
            }
            SocketEvent::Close(info) => {
                tracing::info!(
                    session_id = %session_id,
                    code = ?info.code,
                    reason = %info.reason,
                    "Connection closed"
                );
                self.session = None;
                self.state = ConnectionState::Closed;
                self.schedule_retry();
            }
            SocketEvent::Error(message) => {
                tracing::debug!(session_id = %session_id, error = %message, "Transport error");
            }
            SocketEvent::Message(_) => {}
        }

        Some(event)
    }

    fn on_stale(&mut self, session_id: SessionId, event: SocketEvent) -> Option<SocketEvent> {
        if matches!(event, SocketEvent::Close(_)) && self.draining.remove(&session_id) {
            tracing::debug!(session_id = %session_id, "User-closed session finished");
            return Some(event);
        }

        tracing::trace!(
            session_id = %session_id,
            kind = %event.kind(),
            "Stale notification ignored"
        );
        None
    }

    fn schedule_retry(&mut self) {
        if !self.reconnect_automatically {
            tracing::debug!("Automatic reconnection disabled");
            return;
        }

        match self.retry.schedule(self.attempt) {
            Some((_, delay)) => {
                tracing::debug!(
                    attempt = self.attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnection scheduled"
                );
                self.attempt += 1;
            }
            None => {
                tracing::warn!(
                    attempts = self.attempt,
                    limit = ?self.retry.policy().attempt_limit,
                    "Retry attempts exhausted"
                );
                self.exhausted = true;
            }
        }
    }

    fn open_session(&mut self) {
        let id = SessionId::generate();
        let sink = EventSink::new(id, self.inputs.clone());
        let handle = self.transport.open(self.request.clone(), sink);

        tracing::info!(session_id = %id, url = %self.request.url, "Connecting");
        self.session = Some(Session { id, handle });
        self.state = ConnectionState::Connecting;
    }
}

impl fmt::Debug for ConnectionMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMachine")
            .field("state", &self.state)
            .field("url", &self.request.url.as_str())
            .field("session_id", &self.session_id())
            .field("attempt", &self.attempt)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
