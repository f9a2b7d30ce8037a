//! Reconnecting socket
//!
//! User calls lock the machine, act, and return; the state they cause is
//! observable as soon as they return. Transport notifications and retry fires
//! are applied by a driver task in arrival order. Listeners always run after
//! the machine lock is released, from a snapshot of the registry, so they may
//! call back into the socket.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use resock_common::{ConfigError, SocketSettings, ValidatedSettings};
use resock_core::{
    invoke_all, ConnectionState, EventKind, Frame, Listener, ListenerRegistry, ListenerTable,
    SessionId, SocketEvent, SocketResult,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::ReconnectingSocketBuilder;
use crate::machine::{ConnectionMachine, Input};
use crate::retry::RetryController;
use crate::transport::{ConnectRequest, Transport};

struct Shared {
    machine: Mutex<ConnectionMachine>,
    listeners: RwLock<ListenerRegistry>,
}

impl Shared {
    fn apply(&self, input: Input) {
        let event = self.machine.lock().handle(input);
        if let Some(event) = event {
            self.dispatch(&event);
        }
    }

    fn dispatch(&self, event: &SocketEvent) {
        let listeners = self.listeners.read().snapshot(event.kind());
        let failures = invoke_all(&listeners, event);
        if !failures.is_empty() {
            let indices: Vec<usize> = failures.iter().map(|f| f.index).collect();
            tracing::debug!(
                kind = %event.kind(),
                invoked = listeners.len(),
                failed = ?indices,
                "Dispatch finished with listener failures"
            );
        }
    }
}

/// Driver loop; ends when the socket is dropped
async fn drive(shared: Weak<Shared>, mut inputs: mpsc::UnboundedReceiver<Input>) {
    while let Some(input) = inputs.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.apply(input);
    }
    tracing::trace!("Socket driver stopped");
}

/// WebSocket client that reconnects after the connection drops
///
/// A session is opened as soon as the socket is built. Dropping the socket
/// stops reconnecting and closes the live session.
pub struct ReconnectingSocket {
    shared: Arc<Shared>,
    url: Url,
    driver: JoinHandle<()>,
}

impl ReconnectingSocket {
    /// Start building a socket from `settings`
    pub fn builder(settings: SocketSettings) -> ReconnectingSocketBuilder {
        ReconnectingSocketBuilder::new(settings)
    }

    /// Validate `settings`, register `listeners` and start connecting
    ///
    /// Fails with [`ConfigError::NoRuntime`] outside a Tokio runtime.
    pub fn new(settings: SocketSettings, listeners: ListenerTable) -> Result<Self, ConfigError> {
        Self::builder(settings).listeners(listeners).build()
    }

    pub(crate) fn spawn(
        runtime: &Handle,
        settings: ValidatedSettings,
        listeners: ListenerTable,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let url = settings.url.clone();
        let request = ConnectRequest::new(settings.url).with_protocols(settings.protocols);
        let retry = RetryController::new(settings.retry, inputs_tx.clone());

        let machine = ConnectionMachine::start(
            request,
            transport,
            retry,
            settings.reconnect_automatically,
            inputs_tx,
        );

        let shared = Arc::new(Shared {
            machine: Mutex::new(machine),
            listeners: RwLock::new(ListenerRegistry::from(listeners)),
        });
        let driver = runtime.spawn(drive(Arc::downgrade(&shared), inputs_rx));

        Self {
            shared,
            url,
            driver,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.shared.machine.lock().state()
    }

    /// Endpoint this socket connects to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Id of the live transport session, if any
    pub fn session_id(&self) -> Option<SessionId> {
        self.shared.machine.lock().session_id()
    }

    /// Check whether the attempt limit stopped automatic reconnection
    ///
    /// The state stays `Closed` until `connect()` or `disconnect()`.
    pub fn retries_exhausted(&self) -> bool {
        self.shared.machine.lock().retries_exhausted()
    }

    /// Connect now
    ///
    /// No-op while connecting or connected. From `Closed` the pending retry
    /// is cancelled and a session is opened immediately.
    pub fn connect(&self) {
        self.shared.machine.lock().connect();
    }

    /// Close the live session and stop reconnecting
    ///
    /// The state is `Disconnected` when this returns. `close` listeners still
    /// receive the session's final close notification.
    pub fn disconnect(&self) {
        self.shared.machine.lock().disconnect();
    }

    /// Send a frame
    ///
    /// Fails with [`SocketError::SendWhileDisconnected`](resock_core::SocketError)
    /// unless the state is `Connected`.
    pub fn send(&self, frame: impl Into<Frame>) -> SocketResult<()> {
        self.shared.machine.lock().send(frame.into())
    }

    /// Send a text frame
    pub fn send_text(&self, text: impl Into<String>) -> SocketResult<()> {
        self.send(Frame::Text(text.into()))
    }

    /// Send a binary frame
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> SocketResult<()> {
        self.send(Frame::Binary(data.into()))
    }

    /// Register a listener; it runs after those already registered
    pub fn on(&self, kind: EventKind, listener: Listener) {
        self.shared.listeners.write().add(kind, listener);
    }

    /// Register a closure and return its handle for [`off`](Self::off)
    pub fn on_event<F>(&self, kind: EventKind, callback: F) -> Listener
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        let listener = Listener::new(callback);
        self.on(kind, listener.clone());
        listener
    }

    /// Remove the first registration of `listener`
    ///
    /// Returns whether one was removed.
    pub fn off(&self, kind: EventKind, listener: &Listener) -> bool {
        self.shared.listeners.write().remove(kind, listener)
    }

    /// Number of listeners registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.shared.listeners.read().len(kind)
    }
}

impl Drop for ReconnectingSocket {
    fn drop(&mut self) {
        self.driver.abort();
        self.shared.machine.lock().shutdown();
        tracing::debug!(url = %self.url, "Socket dropped");
    }
}

impl std::fmt::Debug for ReconnectingSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingSocket")
            .field("url", &self.url.as_str())
            .field("machine", &*self.shared.machine.lock())
            .finish()
    }
}
