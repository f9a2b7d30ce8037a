//! resock demo client
//!
//! Run with:
//! ```bash
//! RESOCK_URL=ws://127.0.0.1:9001 cargo run -p resock-client
//! ```
//!
//! Connects to `RESOCK_URL`, logs every lifecycle event, and sends each line
//! read from stdin as a text frame. Ctrl-C disconnects and exits.

use std::sync::Arc;
use std::time::Duration;

use resock_client::{EventKind, Listener, ListenerTable, ReconnectingSocket, SocketEvent};
use resock_common::{
    try_init_tracing_with_config, ClientError, ClientResult, SocketSettings, TracingConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// How long to wait for the peer to acknowledge our close on exit
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::from_env()) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, code = e.error_code(), "resock failed");
        std::process::exit(e.exit_code());
    }
}

fn event_logger() -> Listener {
    Listener::new(|event| match event {
        SocketEvent::Open => info!("open"),
        SocketEvent::Message(frame) => match frame.as_text() {
            Some(text) => info!(text = %text, "message"),
            None => info!(len = frame.len(), "binary message"),
        },
        SocketEvent::Close(close) => info!(code = ?close.code, reason = %close.reason, "close"),
        SocketEvent::Error(message) => warn!(error = %message, "error"),
    })
}

async fn run() -> ClientResult<()> {
    let settings = SocketSettings::from_env()?;
    info!(
        url = %settings.url,
        retry_delay_ms = settings.retry_delay_ms,
        "Configuration loaded"
    );

    let logger = event_logger();
    let table = EventKind::ALL
        .iter()
        .fold(ListenerTable::new(), |table, kind| table.on(*kind, logger.clone()));
    let socket = ReconnectingSocket::new(settings, table)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) if line.is_empty() => {}
                Some(line) => {
                    if let Err(e) = socket.send_text(line) {
                        warn!(error = %e, state = %socket.state(), "Line dropped");
                    }
                }
                None => {
                    info!("stdin closed; press Ctrl-C to exit");
                    stdin_open = false;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(ClientError::internal)?;
                info!("Shutting down");
                shutdown(&socket).await;
                break;
            }
        }
    }

    Ok(())
}

/// Disconnect and give the live session a moment to finish its close handshake
async fn shutdown(socket: &ReconnectingSocket) {
    let had_session = socket.state().has_session();

    let closed = Arc::new(Notify::new());
    let notify = closed.clone();
    socket.on_event(EventKind::Close, move |_| notify.notify_one());
    socket.disconnect();

    if had_session && tokio::time::timeout(CLOSE_GRACE, closed.notified()).await.is_err() {
        warn!("Peer did not acknowledge close");
    }
}
