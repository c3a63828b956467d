//! Integration tests for client connection reuse, deadlines, and hygiene.

use std::time::Duration;

use unixsock::ipc::Client;
use unixsock::{AppError, Arguments, ClientConfig, TransportConfig};

use super::test_helpers::{
    client_config, echo_handler, socket_path, start_server, wait_until, SlowHandler,
};

/// A reply slower than the deadline is a timeout, the connection is
/// abandoned, and the next send dials afresh.
#[tokio::test]
async fn slow_reply_times_out_and_drops_connection() {
    let temp = tempfile::tempdir().expect("tempdir");
    let server = start_server(
        temp.path(),
        SlowHandler {
            delay: Duration::from_millis(600),
        },
    )
    .await;
    let config = client_config(temp.path())
        .with_transport(TransportConfig::default().with_timeout(Duration::from_millis(150)));
    let mut client = Client::new(config);

    let err = client
        .send("slow", Arguments::new(), true, false)
        .await
        .expect_err("deadline exceeded");
    assert!(err.is_timeout(), "{err}");
    assert!(!client.is_connected());

    let response = client
        .send("ping", Arguments::new(), true, true)
        .await
        .expect("fresh connection")
        .expect("response requested");
    assert_eq!(response.payload, "ping");
    assert_eq!(server.sessions_started(), 2);
}

/// Nothing listening at the path is a dial error.
#[tokio::test]
async fn dial_to_missing_socket_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut client = Client::new(ClientConfig::new(socket_path(temp.path())));

    let result = client.send("ping", Arguments::new(), true, true).await;

    assert!(matches!(result, Err(AppError::Dial(_))), "{result:?}");
    assert!(!client.is_connected());
}

/// Sends inside the freshness window share one connection.
#[tokio::test]
async fn fresh_connection_is_reused() {
    let temp = tempfile::tempdir().expect("tempdir");
    let server = start_server(temp.path(), echo_handler).await;
    let mut client = Client::new(client_config(temp.path()));

    for command in ["one", "two", "three"] {
        let response = client
            .send(command, Arguments::new(), true, false)
            .await
            .expect("exchange")
            .expect("response requested");
        assert_eq!(response.payload, command);
    }

    assert!(client.is_connected());
    assert_eq!(server.sessions_started(), 1);
    assert_eq!(server.active_sessions(), 1);
}

/// Once the held connection is older than the window it is closed and
/// replaced.
#[tokio::test]
async fn stale_connection_is_replaced() {
    let temp = tempfile::tempdir().expect("tempdir");
    let server = start_server(temp.path(), echo_handler).await;
    let config = client_config(temp.path()).with_freshness(Duration::from_millis(50));
    let mut client = Client::new(config);

    client
        .send("before", Arguments::new(), true, false)
        .await
        .expect("first exchange");
    tokio::time::sleep(Duration::from_millis(120)).await;
    client
        .send("after", Arguments::new(), true, false)
        .await
        .expect("second exchange");

    assert_eq!(server.sessions_started(), 2);
    assert!(wait_until(|| server.active_sessions() == 1).await);
}

/// Asking the server to close also releases the client side.
#[tokio::test]
async fn close_after_this_releases_connection() {
    let temp = tempfile::tempdir().expect("tempdir");
    let server = start_server(temp.path(), echo_handler).await;
    let mut client = Client::new(client_config(temp.path()));

    client
        .send("bye", Arguments::new(), true, true)
        .await
        .expect("exchange");

    assert!(!client.is_connected());
    assert!(wait_until(|| server.active_sessions() == 0).await);
}

/// `quit` is harmless without a connection and closes one that is held.
#[tokio::test]
async fn quit_closes_held_connection() {
    let temp = tempfile::tempdir().expect("tempdir");
    let server = start_server(temp.path(), echo_handler).await;
    let mut client = Client::new(client_config(temp.path()));

    client.quit().await;
    assert!(!client.is_connected());

    client
        .send("hold", Arguments::new(), true, false)
        .await
        .expect("exchange");
    assert!(client.is_connected());

    client.quit().await;
    assert!(!client.is_connected());
    assert!(wait_until(|| server.active_sessions() == 0).await);
}

/// `call` takes its flags from the client configuration.
#[tokio::test]
async fn call_uses_configured_defaults() {
    let temp = tempfile::tempdir().expect("tempdir");
    let _server = start_server(temp.path(), echo_handler).await;

    let mut quiet = Client::new(client_config(temp.path()).with_defaults(false, false));
    let outcome = quiet.call("notify", Arguments::new()).await.expect("call");
    assert!(outcome.is_none());
    assert!(quiet.is_connected());

    let mut chatty = Client::new(client_config(temp.path()));
    assert!(chatty.config().expect_response);
    let outcome = chatty.call("status", Arguments::new()).await.expect("call");
    assert_eq!(outcome.expect("response requested").payload, "status");
    assert!(!chatty.is_connected());
}
