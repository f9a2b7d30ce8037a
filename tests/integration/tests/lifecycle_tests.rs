//! Lifecycle Integration Tests
//!
//! Each test runs a real `ReconnectingSocket` with the WebSocket transport
//! against a local mock server. No external services are needed.
//!
//! Run with: cargo test -p integration-tests --test lifecycle_tests

use std::time::Duration;

use integration_tests::{
    get_test_port, init_test_tracing, local_url, test_settings, wait_for_state, wait_until,
    EventLog, MockServer,
};
use resock_client::{ConnectionState, EventKind, ListenerTable, ReconnectingSocket, SocketError};

// ============================================================================
// Connect / Send
// ============================================================================

#[tokio::test]
async fn test_connects_and_echoes() {
    init_test_tracing();
    let server = MockServer::start().await.unwrap();
    let log = EventLog::new();

    let socket = ReconnectingSocket::new(test_settings(&server.url()), log.table()).unwrap();
    assert_eq!(socket.state(), ConnectionState::Connecting);

    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();
    socket.send_text("hello").unwrap();

    wait_until("echo", || log.count("message:hello") == 1)
        .await
        .unwrap();
    assert_eq!(server.received(), vec!["hello"]);
    assert_eq!(log.entries(), vec!["open", "message:hello"]);
}

#[tokio::test]
async fn test_send_while_disconnected_errors() {
    init_test_tracing();
    let server = MockServer::start().await.unwrap();
    let socket = ReconnectingSocket::new(test_settings(&server.url()), ListenerTable::new()).unwrap();

    let err = socket.send_text("too early").unwrap_err();
    assert!(matches!(
        err,
        SocketError::SendWhileDisconnected {
            state: ConnectionState::Connecting
        }
    ));

    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();
    socket.disconnect();

    let err = socket.send_text("too late").unwrap_err();
    assert!(err.is_state_error());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.received().is_empty());
}

#[tokio::test]
async fn test_offers_subprotocols() {
    init_test_tracing();
    let server = MockServer::start().await.unwrap();
    let settings = test_settings(&server.url()).protocols(["chat.v2", "chat.v1"]);

    let socket = ReconnectingSocket::new(settings, ListenerTable::new()).unwrap();
    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();

    assert_eq!(server.offered_protocols(), vec!["chat.v2, chat.v1"]);
}

// ============================================================================
// Reconnection
// ============================================================================

#[tokio::test]
async fn test_cycles_through_closed_connection() {
    init_test_tracing();
    let server = MockServer::start().await.unwrap();
    let log = EventLog::new();
    let settings = test_settings(&server.url()).retry_delay_ms(300);

    let socket = ReconnectingSocket::new(settings, log.table()).unwrap();
    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();

    server.kick_all();
    wait_for_state(&socket, ConnectionState::Closed).await.unwrap();
    assert_eq!(log.count("close:1001"), 1);

    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();
    assert_eq!(server.connection_count(), 2);
    assert_eq!(log.entries(), vec!["open", "close:1001", "open"]);
}

#[tokio::test]
async fn test_retries_until_server_appears() {
    init_test_tracing();
    let port = get_test_port();
    let log = EventLog::new();

    let socket = ReconnectingSocket::new(test_settings(&local_url(port)), log.table()).unwrap();
    wait_until("two failed attempts", || log.count("error") >= 2)
        .await
        .unwrap();
    assert_ne!(socket.state(), ConnectionState::Connected);
    assert_eq!(log.count("open"), 0);

    let server = MockServer::start_on(port).await.unwrap();
    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();

    // Listeners given at construction see the first successful open
    wait_until("configured open", || log.count("open") == 1)
        .await
        .unwrap();
    assert_eq!(server.connection_count(), 1);
    assert!(!socket.retries_exhausted());
}

#[tokio::test]
async fn test_retry_exhaustion_stays_closed() {
    init_test_tracing();
    let port = get_test_port();
    let log = EventLog::new();
    let settings = test_settings(&local_url(port))
        .retry_delay_ms(20)
        .retry_attempt_limit(2);

    let socket = ReconnectingSocket::new(settings, log.table()).unwrap();
    wait_until("retries exhausted", || socket.retries_exhausted())
        .await
        .unwrap();

    // Initial attempt plus two retries
    assert_eq!(log.count("error"), 3);
    assert_eq!(log.count("close"), 3);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(socket.state(), ConnectionState::Closed);
    assert_eq!(log.count("error"), 3);

    // An explicit connect starts over
    let server = MockServer::start_on(port).await.unwrap();
    socket.connect();
    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();
    assert!(!socket.retries_exhausted());
    assert_eq!(server.connection_count(), 1);
}

// ============================================================================
// Disconnect
// ============================================================================

#[tokio::test]
async fn test_cycles_through_disconnect() {
    init_test_tracing();
    let server = MockServer::start().await.unwrap();
    let log = EventLog::new();

    let socket = ReconnectingSocket::new(test_settings(&server.url()), log.table()).unwrap();
    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();

    socket.disconnect();
    assert_eq!(socket.state(), ConnectionState::Disconnected);

    // The user-requested close still reaches close listeners
    wait_until("close event", || log.count("close") == 1)
        .await
        .unwrap();
    assert_eq!(log.entries(), vec!["open", "close:1000"]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(socket.state(), ConnectionState::Disconnected);
    assert_eq!(server.connection_count(), 1);

    socket.connect();
    assert_eq!(socket.state(), ConnectionState::Connecting);
    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();
    assert_eq!(server.connection_count(), 2);
}

#[tokio::test]
async fn test_disconnect_while_closed_cancels_retry() {
    init_test_tracing();
    let server = MockServer::start().await.unwrap();
    let settings = test_settings(&server.url()).retry_delay_ms(300);

    let socket = ReconnectingSocket::new(settings, ListenerTable::new()).unwrap();
    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();

    server.kick_all();
    wait_for_state(&socket, ConnectionState::Closed).await.unwrap();
    socket.disconnect();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(socket.state(), ConnectionState::Disconnected);
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_drop_closes_connection() {
    init_test_tracing();
    let server = MockServer::start().await.unwrap();

    let socket = ReconnectingSocket::new(test_settings(&server.url()), ListenerTable::new()).unwrap();
    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();
    drop(socket);

    wait_until("server side close", || server.finished_count() == 1)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connection_count(), 1);
}

// ============================================================================
// Listeners
// ============================================================================

#[tokio::test]
async fn test_configured_listeners_fire_on_open() {
    init_test_tracing();
    let server = MockServer::start().await.unwrap();
    let log = EventLog::new();
    let table = ListenerTable::new().on(EventKind::Open, log.named("configured"));

    let _socket = ReconnectingSocket::new(test_settings(&server.url()), table).unwrap();

    wait_until("open listener", || log.count("configured:open") == 1)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_listener_order() {
    init_test_tracing();
    let server = MockServer::start().await.unwrap();
    let log = EventLog::new();
    let table = ListenerTable::new()
        .on(EventKind::Message, log.named("first"))
        .on(EventKind::Message, log.named("second"));

    let socket = ReconnectingSocket::builder(test_settings(&server.url()))
        .listeners(table)
        .on(EventKind::Message, log.named("third"))
        .build()
        .unwrap();
    socket.on(EventKind::Message, log.named("fourth"));

    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();
    socket.send_text("ping").unwrap();

    wait_until("all listeners", || log.entries().len() == 4)
        .await
        .unwrap();
    assert_eq!(
        log.entries(),
        vec![
            "first:message",
            "second:message",
            "third:message",
            "fourth:message"
        ]
    );
}

#[tokio::test]
async fn test_removed_listener_is_not_called() {
    init_test_tracing();
    let server = MockServer::start().await.unwrap();
    let log = EventLog::new();
    let removed = log.named("removed");

    let socket = ReconnectingSocket::new(test_settings(&server.url()), ListenerTable::new()).unwrap();
    socket.on(EventKind::Message, removed.clone());
    socket.on(EventKind::Message, log.named("kept"));
    assert!(socket.off(EventKind::Message, &removed));
    assert!(!socket.off(EventKind::Message, &removed));

    wait_for_state(&socket, ConnectionState::Connected).await.unwrap();
    socket.send_text("ping").unwrap();

    wait_until("kept listener", || log.count("kept") == 1)
        .await
        .unwrap();
    assert_eq!(log.entries(), vec!["kept:message"]);
}
