//! Test helpers for integration tests
//!
//! Provides a mock WebSocket server, unique ports, and polling waits.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use resock_client::{ConnectionState, ReconnectingSocket};
use resock_common::{try_init_tracing_with_config, SocketSettings, TracingConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

/// Counter for unique test ports
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19000);

/// Upper bound for any wait in a test
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between condition checks
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Get a unique port for testing
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Install a test subscriber once; later calls are no-ops
pub fn init_test_tracing() {
    let _ = try_init_tracing_with_config(TracingConfig::development());
}

/// Settings pointing at `url` with a short retry delay
pub fn test_settings(url: &str) -> SocketSettings {
    SocketSettings::new(url).retry_delay_ms(50)
}

/// `ws://` URL for a local port
pub fn local_url(port: u16) -> String {
    format!("ws://127.0.0.1:{port}")
}

#[derive(Debug, Default)]
struct ServerState {
    connections: AtomicUsize,
    finished: AtomicUsize,
    received: Mutex<Vec<String>>,
    offered_protocols: Mutex<Vec<String>>,
}

/// Echoing WebSocket server
///
/// Text and binary frames are sent back unchanged. The server answers the
/// first offered sub-protocol, and can drop every live connection on demand.
pub struct MockServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
    kick: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Start a server on a fresh port
    pub async fn start() -> Result<Self> {
        Self::start_on(get_test_port()).await
    }

    /// Start a server on `port`
    pub async fn start_on(port: u16) -> Result<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(ServerState::default());
        let (kick, _) = broadcast::channel(4);

        let handle = tokio::spawn(accept_loop(listener, state.clone(), kick.clone()));

        Ok(Self {
            addr,
            state,
            kick,
            handle,
        })
    }

    /// URL clients should connect to
    pub fn url(&self) -> String {
        local_url(self.addr.port())
    }

    /// Number of completed handshakes so far
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Number of connections that have ended
    pub fn finished_count(&self) -> usize {
        self.state.finished.load(Ordering::SeqCst)
    }

    /// Text frames received from clients, in order
    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }

    /// Raw `Sec-WebSocket-Protocol` values offered by clients
    pub fn offered_protocols(&self) -> Vec<String> {
        self.state.offered_protocols.lock().unwrap().clone()
    }

    /// Close every live connection with 1001 (going away)
    pub fn kick_all(&self) {
        let _ = self.kick.send(());
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
        self.kick_all();
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<ServerState>, kick: broadcast::Sender<()>) {
    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(handle_connection(stream, state.clone(), kick.subscribe()));
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<ServerState>,
    mut kick: broadcast::Receiver<()>,
) {
    let callback = |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        let offered = request
            .headers()
            .get(SEC_WEBSOCKET_PROTOCOL)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        if let Some(offered) = offered {
            let first = offered.split(',').map(str::trim).next().unwrap_or_default();
            if let Ok(value) = HeaderValue::from_str(first) {
                response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
            }
            state.offered_protocols.lock().unwrap().push(offered);
        }

        Ok(response)
    };

    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };
    state.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            message = ws.next() => match message {
                Some(Ok(message)) if message.is_text() || message.is_binary() => {
                    if message.is_text() {
                        let text = message.to_text().unwrap_or_default().to_string();
                        state.received.lock().unwrap().push(text);
                    }
                    if ws.send(message).await.is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            _ = kick.recv() => {
                let frame = CloseFrame {
                    code: CloseCode::Away,
                    reason: "server going away".into(),
                };
                let _ = ws.close(Some(frame)).await;
                while let Some(Ok(_)) = ws.next().await {}
                break;
            }
        }
    }

    state.finished.fetch_add(1, Ordering::SeqCst);
}

/// Poll `condition` until it holds or the wait times out
pub async fn wait_until<F>(what: &str, condition: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        if Instant::now() >= deadline {
            anyhow::bail!("Timed out waiting for {what}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Ok(())
}

/// Wait until `socket` reports `state`
pub async fn wait_for_state(socket: &ReconnectingSocket, state: ConnectionState) -> Result<()> {
    wait_until(&format!("state {state}"), || socket.state() == state).await
}
