//! Integration tests for server start-up, dispatch, and handler isolation.

use std::time::Duration;

use unixsock::ipc::{Client, Connection, Server};
use unixsock::{AppError, Arguments, ServerConfig, Status, Value};

use super::test_helpers::{
    client_config, echo_handler, fast_transport, panicking_handler, socket_path, start_server,
    SlowHandler,
};

/// Binding under a directory that does not exist fails before any task starts.
#[tokio::test]
async fn bind_to_missing_directory_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("absent").join("control.sock");

    let result = Server::start(ServerConfig::new(path), echo_handler).await;

    assert!(matches!(result, Err(AppError::Bind(_))), "{result:?}");
}

/// A second server cannot take over a path that is already being served.
#[tokio::test]
async fn bind_to_path_in_use_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let _first = start_server(temp.path(), echo_handler).await;

    let result = Server::start(ServerConfig::new(socket_path(temp.path())), echo_handler).await;

    assert!(matches!(result, Err(AppError::Bind(_))), "{result:?}");
}

/// Once `start` returns, a dial succeeds without any retry.
#[tokio::test]
async fn dial_succeeds_immediately_after_start() {
    let temp = tempfile::tempdir().expect("tempdir");
    let server = start_server(temp.path(), echo_handler).await;

    let connection = Connection::dial(server.socket_path(), &fast_transport()).await;

    assert!(connection.is_ok(), "{connection:?}");
}

/// One hundred clients in parallel each get back exactly their own answer.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_receive_their_own_responses() {
    let temp = tempfile::tempdir().expect("tempdir");
    let server = start_server(temp.path(), echo_handler).await;

    let mut tasks = Vec::new();
    for id in 0..100_i64 {
        let config = client_config(temp.path());
        tasks.push(tokio::spawn(async move {
            let mut client = Client::new(config);
            let mut arguments = Arguments::new();
            arguments.insert("id".to_owned(), Value::from(id));
            let response = client
                .send("whoami", arguments, true, true)
                .await
                .expect("exchange")
                .expect("response requested");
            (id, response)
        }));
    }

    for task in tasks {
        let (id, response) = task.await.expect("client task");
        assert_eq!(response.status, Status::Success);
        assert_eq!(response.payload, format!("whoami:{id}"));
    }

    assert_eq!(server.sessions_started(), 100);
}

/// A handler failure is a successful exchange carrying a failure status.
#[tokio::test]
async fn handler_failure_is_delivered_as_response() {
    let temp = tempfile::tempdir().expect("tempdir");
    let _server = start_server(temp.path(), echo_handler).await;
    let mut client = Client::new(client_config(temp.path()));

    let response = client
        .send("unknown", Arguments::new(), true, true)
        .await
        .expect("transport succeeds")
        .expect("response requested");

    assert_eq!(response.status, Status::Failure);
    assert_eq!(response.error, "unknown command");
    assert!(response.payload.is_empty());
}

/// A panicking handler is reported to the caller and the server keeps serving.
#[tokio::test]
async fn handler_panic_becomes_failure_response() {
    let temp = tempfile::tempdir().expect("tempdir");
    let _server = start_server(temp.path(), panicking_handler).await;
    let mut client = Client::new(client_config(temp.path()));

    let response = client
        .send("boom", Arguments::new(), true, false)
        .await
        .expect("transport succeeds")
        .expect("response requested");
    assert_eq!(response.status, Status::Failure);
    assert_eq!(response.error, "handler panicked");

    let response = client
        .send("ping", Arguments::new(), true, true)
        .await
        .expect("transport succeeds")
        .expect("response requested");
    assert!(response.is_success());
    assert_eq!(response.payload, "ping");
}

/// A slow command on one connection does not hold up another connection.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_handler_only_delays_its_own_session() {
    let temp = tempfile::tempdir().expect("tempdir");
    let _server = start_server(
        temp.path(),
        SlowHandler {
            delay: Duration::from_millis(800),
        },
    )
    .await;

    let slow_config = client_config(temp.path());
    let slow = tokio::spawn(async move {
        let mut client = Client::new(slow_config);
        client.send("slow", Arguments::new(), true, true).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut fast = Client::new(client_config(temp.path()));
    let started = tokio::time::Instant::now();
    let response = fast
        .send("fast", Arguments::new(), true, true)
        .await
        .expect("exchange")
        .expect("response requested");

    assert_eq!(response.payload, "fast");
    assert!(started.elapsed() < Duration::from_millis(600));

    let slow_response = slow.await.expect("slow task").expect("slow exchange");
    assert_eq!(slow_response.expect("response requested").payload, "slow");
}
