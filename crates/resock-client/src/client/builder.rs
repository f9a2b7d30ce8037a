//! Builder for [`ReconnectingSocket`]

use std::sync::Arc;

use resock_common::{ConfigError, SocketSettings};
use resock_core::{EventKind, Listener, ListenerTable};
use tokio::runtime::Handle;

use super::ReconnectingSocket;
use crate::transport::{Transport, WebSocketTransport};

/// Collects settings, initial listeners and the transport
///
/// Nothing is validated or opened until [`build`](Self::build).
pub struct ReconnectingSocketBuilder {
    settings: SocketSettings,
    listeners: ListenerTable,
    transport: Option<Arc<dyn Transport>>,
}

impl ReconnectingSocketBuilder {
    pub(crate) fn new(settings: SocketSettings) -> Self {
        Self {
            settings,
            listeners: ListenerTable::new(),
            transport: None,
        }
    }

    /// Replace the initial listener table
    pub fn listeners(mut self, table: ListenerTable) -> Self {
        self.listeners = table;
        self
    }

    /// Add one initial listener
    ///
    /// Listeners added here are registered before the first session opens,
    /// so they observe its `Open`.
    pub fn on(mut self, kind: EventKind, listener: Listener) -> Self {
        self.listeners = self.listeners.on(kind, listener);
        self
    }

    /// Use a custom transport instead of [`WebSocketTransport`]
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Validate the settings and start connecting
    ///
    /// # Errors
    /// Returns the first invalid setting, or [`ConfigError::NoRuntime`] when
    /// called outside a Tokio runtime.
    pub fn build(self) -> Result<ReconnectingSocket, ConfigError> {
        let validated = self.settings.validate()?;
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WebSocketTransport::new()));

        Ok(ReconnectingSocket::spawn(
            &runtime,
            validated,
            self.listeners,
            transport,
        ))
    }
}

impl std::fmt::Debug for ReconnectingSocketBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingSocketBuilder")
            .field("settings", &self.settings)
            .field("listeners", &self.listeners)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}
