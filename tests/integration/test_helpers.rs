//! Shared fixtures for the integration tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use unixsock::ipc::{CommandHandler, Server};
use unixsock::{Arguments, ClientConfig, Response, ServerConfig, TransportConfig};

/// Socket path inside a per-test temporary directory.
pub fn socket_path(dir: &Path) -> PathBuf {
    dir.join("control.sock")
}

/// Transport with a short deadline so failing tests end quickly.
pub fn fast_transport() -> TransportConfig {
    TransportConfig::default().with_timeout(Duration::from_secs(2))
}

/// Answers every command with its own name, suffixed by the `id` argument
/// when present. `unknown` reports an application failure.
pub fn echo_handler(command: &str, arguments: &Arguments) -> Response {
    if command == "unknown" {
        return Response::failure("unknown command");
    }
    match arguments.get("id").and_then(|value| value.as_i64()) {
        Some(id) => Response::success(format!("{command}:{id}")),
        None => Response::success(command),
    }
}

/// Panics on `boom`, echoes everything else.
pub fn panicking_handler(command: &str, arguments: &Arguments) -> Response {
    assert_ne!(command, "boom", "handler asked to blow up");
    echo_handler(command, arguments)
}

/// Records every command it sees, in order.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingHandler {
    pub fn commands(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl CommandHandler for RecordingHandler {
    fn handle(&self, command: &str, _arguments: &Arguments) -> Response {
        self.seen.lock().unwrap().push(command.to_owned());
        Response::success(command)
    }
}

/// Sleeps before answering `slow`.
pub struct SlowHandler {
    pub delay: Duration,
}

impl CommandHandler for SlowHandler {
    fn handle(&self, command: &str, arguments: &Arguments) -> Response {
        if command == "slow" {
            std::thread::sleep(self.delay);
        }
        echo_handler(command, arguments)
    }
}

/// Start a server with [`fast_transport`] on a fresh socket in `dir`.
pub async fn start_server<H: CommandHandler>(dir: &Path, handler: H) -> Server {
    let config = ServerConfig::new(socket_path(dir)).with_transport(fast_transport());
    Server::start(config, handler).await.expect("server start")
}

/// Client for the socket in `dir` with [`fast_transport`].
pub fn client_config(dir: &Path) -> ClientConfig {
    ClientConfig::new(socket_path(dir)).with_transport(fast_transport())
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
