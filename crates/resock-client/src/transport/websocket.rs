//! WebSocket transport over tokio-tungstenite
//!
//! Each session runs in its own task: handshake, then a select loop over
//! outgoing commands and incoming frames. The task always ends by reporting
//! exactly one `Close`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use resock_core::{CloseInfo, Frame, SocketError, SocketEvent, SocketResult};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::{ConnectRequest, EventSink, Transport, TransportHandle};

/// Time the peer gets to answer our close frame
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Close code reported when the user closes before the handshake finished
const NORMAL_CLOSURE: u16 = 1000;

/// Opens WebSocket sessions with `tokio_tungstenite::connect_async`
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create the transport
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, request: ConnectRequest, sink: EventSink) -> Box<dyn TransportHandle> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_session(request, sink, commands_rx, open.clone()));

        Box::new(WebSocketHandle {
            commands: commands_tx,
            open,
        })
    }
}

/// Commands from the handle to the session task
#[derive(Debug)]
enum Command {
    Send(Message),
    Close,
}

struct WebSocketHandle {
    commands: mpsc::UnboundedSender<Command>,
    open: Arc<AtomicBool>,
}

impl TransportHandle for WebSocketHandle {
    fn send(&self, frame: Frame) -> SocketResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(SocketError::Transport("session is not open".to_string()));
        }

        self.commands
            .send(Command::Send(to_message(frame)))
            .map_err(|_| SocketError::Transport("session has ended".to_string()))
    }

    fn close(&self) {
        // The task may already be gone, in which case Close was reported
        let _ = self.commands.send(Command::Close);
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Binary(data) => Message::Binary(data),
    }
}

fn close_info(frame: Option<CloseFrame<'_>>) -> CloseInfo {
    frame
        .map(|f| CloseInfo::new(u16::from(f.code), f.reason.into_owned()))
        .unwrap_or_default()
}

/// Build the handshake request, offering sub-protocols if any
fn build_request(request: &ConnectRequest) -> Result<Request, String> {
    let mut ws_request = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| e.to_string())?;

    if !request.protocols.is_empty() {
        let value = HeaderValue::from_str(&request.protocols.join(", "))
            .map_err(|e| format!("Invalid protocol header: {e}"))?;
        ws_request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    Ok(ws_request)
}

/// Resolves once the handle asks to close or is dropped
async fn close_requested(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        if matches!(command, Command::Close) {
            return;
        }
    }
}

fn report_failure(sink: &EventSink, message: String) {
    tracing::warn!(
        session_id = %sink.session_id(),
        error = %message,
        "WebSocket handshake failed"
    );
    sink.emit(SocketEvent::Error(message));
    sink.emit(SocketEvent::Close(CloseInfo::abnormal()));
}

async fn run_session(
    request: ConnectRequest,
    sink: EventSink,
    mut commands: mpsc::UnboundedReceiver<Command>,
    open: Arc<AtomicBool>,
) {
    let session_id = sink.session_id();

    let ws_request = match build_request(&request) {
        Ok(r) => r,
        Err(e) => {
            report_failure(&sink, e);
            return;
        }
    };

    tracing::debug!(session_id = %session_id, url = %request.url, "Opening WebSocket");

    let stream = tokio::select! {
        result = tokio_tungstenite::connect_async(ws_request) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                report_failure(&sink, e.to_string());
                return;
            }
        },
        () = close_requested(&mut commands) => {
            tracing::debug!(session_id = %session_id, "Handshake abandoned");
            sink.emit(SocketEvent::Close(CloseInfo::new(NORMAL_CLOSURE, "closed before open")));
            return;
        }
    };

    open.store(true, Ordering::Release);
    tracing::info!(session_id = %session_id, url = %request.url, "WebSocket opened");
    sink.emit(SocketEvent::Open);

    let (mut ws_sink, mut ws_stream) = stream.split();
    let mut received_close: Option<CloseInfo> = None;
    let mut close_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = commands.recv(), if close_deadline.is_none() => match command {
                Some(Command::Send(message)) => {
                    if let Err(e) = ws_sink.send(message).await {
                        tracing::debug!(session_id = %session_id, error = %e, "Send failed");
                        sink.emit(SocketEvent::Error(e.to_string()));
                    }
                }
                Some(Command::Close) | None => {
                    open.store(false, Ordering::Release);
                    close_deadline = Some(Instant::now() + CLOSE_TIMEOUT);
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    };
                    if let Err(e) = ws_sink.send(Message::Close(Some(frame))).await {
                        tracing::debug!(session_id = %session_id, error = %e, "Close frame not sent");
                        break;
                    }
                }
            },

            message = ws_stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    tracing::trace!(session_id = %session_id, len = text.len(), "Text frame received");
                    sink.emit(SocketEvent::Message(Frame::Text(text)));
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::trace!(session_id = %session_id, len = data.len(), "Binary frame received");
                    sink.emit(SocketEvent::Message(Frame::Binary(data)));
                }
                Some(Ok(Message::Close(frame))) => {
                    open.store(false, Ordering::Release);
                    received_close = Some(close_info(frame));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    tracing::trace!(session_id = %session_id, "Control frame received");
                }
                Some(Err(e)) => {
                    tracing::warn!(session_id = %session_id, error = %e, "WebSocket error");
                    sink.emit(SocketEvent::Error(e.to_string()));
                    break;
                }
                None => break,
            },

            () = tokio::time::sleep_until(close_deadline.unwrap_or_else(Instant::now)), if close_deadline.is_some() => {
                tracing::debug!(session_id = %session_id, "Peer did not answer close frame");
                break;
            }
        }
    }

    open.store(false, Ordering::Release);
    let info = received_close.unwrap_or_else(CloseInfo::abnormal);
    tracing::info!(
        session_id = %session_id,
        code = ?info.code,
        reason = %info.reason,
        "WebSocket closed"
    );
    sink.emit(SocketEvent::Close(info));
}
