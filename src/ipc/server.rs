//! Local-socket server: acceptor, dispatcher, and one task per session.
//!
//! ## Task layout
//!
//! - **acceptor** takes connections off the listener and hands each one to
//!   the dispatcher through a single-slot queue. When the dispatcher falls
//!   behind, the hand-off blocks and pending connections wait in the OS
//!   backlog instead of in memory.
//! - **dispatcher** spawns one session task per handed-off connection
//!   through the [`SessionRegistry`].
//! - **session** loops: read one envelope, run the handler, reply if asked,
//!   close if asked. Any read or framing error ends the session quietly.
//!
//! [`Server::stop`] halts the acceptor and dispatcher and releases the
//! listener; sessions already running are left to finish on their own.
//! [`Server::shutdown`] additionally waits for them and cancels whatever is
//! still open after the grace period.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use interprocess::local_socket::tokio::{prelude::*, Listener, Stream};
use interprocess::local_socket::{GenericFilePath, ListenerOptions, ToFsName};
use tokio::sync::{mpsc, Barrier};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{ServerConfig, TransportConfig};
use crate::ipc::connection::Connection;
use crate::ipc::registry::{SessionRegistry, ShutdownReport};
use crate::models::{Arguments, Envelope, Response};
use crate::{AppError, Result};

/// Capacity of the acceptor → dispatcher hand-off queue.
pub const HANDOFF_CAPACITY: usize = 1;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// Maps a command and its arguments to a response.
///
/// Called from many sessions at once, each call on the blocking pool, so a
/// slow command only delays later messages on its own connection.
/// Application failures belong in [`Response::failure`]; the transport
/// reports them as successful exchanges.
pub trait CommandHandler: Send + Sync + 'static {
    /// Handle one command.
    fn handle(&self, command: &str, arguments: &Arguments) -> Response;
}

impl<F> CommandHandler for F
where
    F: Fn(&str, &Arguments) -> Response + Send + Sync + 'static,
{
    fn handle(&self, command: &str, arguments: &Arguments) -> Response {
        self(command, arguments)
    }
}

/// A running local-socket server.
#[derive(Debug)]
pub struct Server {
    socket_path: PathBuf,
    cancel: CancellationToken,
    sessions: SessionRegistry,
    acceptor: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Server {
    /// Bind `config.socket_path` and start serving with `handler`.
    ///
    /// Binding happens before any task is spawned. Returns once the acceptor
    /// and dispatcher have both started running; that does not guarantee the
    /// acceptor is already parked on the listener.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Bind` if the socket path cannot be bound.
    pub async fn start<H: CommandHandler>(config: ServerConfig, handler: H) -> Result<Self> {
        let listener = bind(&config.socket_path)?;
        info!(socket_path = %config.socket_path.display(), "IPC server listening");

        let cancel = CancellationToken::new();
        let sessions = SessionRegistry::new();
        let handler: Arc<dyn CommandHandler> = Arc::new(handler);
        let (handoff_tx, handoff_rx) = mpsc::channel::<Stream>(HANDOFF_CAPACITY);
        let startup = Arc::new(Barrier::new(3));
        let span = info_span!("ipc_server", socket_path = %config.socket_path.display());

        let acceptor = tokio::spawn(
            run_acceptor(listener, handoff_tx, cancel.clone(), Arc::clone(&startup))
                .instrument(span.clone()),
        );
        let dispatcher = tokio::spawn(
            run_dispatcher(
                handoff_rx,
                sessions.clone(),
                handler,
                config.transport,
                cancel.clone(),
                Arc::clone(&startup),
            )
            .instrument(span),
        );

        startup.wait().await;

        Ok(Self {
            socket_path: config.socket_path,
            cancel,
            sessions,
            acceptor: Some(acceptor),
            dispatcher: Some(dispatcher),
        })
    }

    /// Path the listener is bound to.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sessions currently open.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.active()
    }

    /// Sessions started since the server came up.
    #[must_use]
    pub fn sessions_started(&self) -> u64 {
        self.sessions.started()
    }

    /// Stop accepting and dispatching, and release the listener.
    ///
    /// Open sessions are not touched and keep serving until their peer
    /// closes, a frame fails, or a message asks to close. Calling `stop`
    /// again is a no-op.
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        for handle in [self.acceptor.take(), self.dispatcher.take()]
            .into_iter()
            .flatten()
        {
            if let Err(err) = handle.await {
                error!(%err, "IPC server task failed");
            }
        }

        info!(
            socket_path = %self.socket_path.display(),
            active_sessions = self.sessions.active(),
            "IPC server stopped"
        );
    }

    /// Stop the server, then wait up to `grace` for open sessions before
    /// cancelling the rest.
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownReport {
        self.stop().await;
        let report = self.sessions.drain(grace).await;
        info!(
            drained = report.drained,
            cancelled = report.cancelled,
            "IPC server shut down"
        );
        report
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn bind(socket_path: &Path) -> Result<Listener> {
    let name = socket_path.to_fs_name::<GenericFilePath>().map_err(|err| {
        AppError::Bind(format!(
            "invalid socket path '{}': {err}",
            socket_path.display()
        ))
    })?;

    ListenerOptions::new()
        .name(name)
        .create_tokio()
        .map_err(|err| {
            AppError::Bind(format!(
                "cannot listen on '{}': {err}",
                socket_path.display()
            ))
        })
}

async fn run_acceptor(
    listener: Listener,
    handoff: mpsc::Sender<Stream>,
    cancel: CancellationToken,
    startup: Arc<Barrier>,
) {
    startup.wait().await;

    loop {
        let stream = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(%err, "IPC accept failed");
                    time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = handoff.send(stream) => {
                if sent.is_err() {
                    debug!("dispatcher gone, acceptor stopping");
                    break;
                }
            }
        }
    }

    debug!("IPC acceptor stopped");
}

async fn run_dispatcher(
    mut handoff: mpsc::Receiver<Stream>,
    sessions: SessionRegistry,
    handler: Arc<dyn CommandHandler>,
    transport: TransportConfig,
    cancel: CancellationToken,
    startup: Arc<Barrier>,
) {
    startup.wait().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = handoff.recv() => {
                let Some(stream) = next else { break };
                let connection = Connection::from_stream(stream, &transport);
                let session_id = sessions.spawn(run_session(connection, Arc::clone(&handler)));
                debug!(session_id, "session dispatched");
            }
        }
    }

    debug!("IPC dispatcher stopped");
}

/// Serve one connection until the peer asks to close or the stream fails.
async fn run_session(mut connection: Connection, handler: Arc<dyn CommandHandler>) {
    debug!("session opened");

    loop {
        let request = match connection.receive().await {
            Ok(envelope) => envelope,
            Err(err @ AppError::Decode(_)) => {
                warn!(%err, "session ended on undecodable frame");
                return;
            }
            Err(err) => {
                debug!(%err, "session ended");
                return;
            }
        };

        debug!(
            command = %request.command,
            expect_response = request.expect_response,
            close_after_this = request.close_after_this,
            "request received"
        );

        let response = invoke(&handler, &request).await;

        if request.expect_response {
            if let Err(err) = connection.transmit(Envelope::reply(&request, response)).await {
                warn!(%err, command = %request.command, "failed to write response");
                return;
            }
        }

        if request.close_after_this {
            break;
        }
    }

    if let Err(err) = connection.close().await {
        debug!(%err, "session close failed");
    }
    debug!("session closed");
}

/// Run the handler on the blocking pool so a slow command stalls only its
/// own session.
async fn invoke(handler: &Arc<dyn CommandHandler>, request: &Envelope) -> Response {
    let handler = Arc::clone(handler);
    let command = request.command.clone();
    let arguments = request.arguments.clone();

    match tokio::task::spawn_blocking(move || handler.handle(&command, &arguments)).await {
        Ok(response) => response,
        Err(err) if err.is_panic() => {
            error!(command = %request.command, "command handler panicked");
            Response::failure("handler panicked")
        }
        Err(err) => {
            warn!(%err, command = %request.command, "command handler cancelled");
            Response::failure("handler cancelled")
        }
    }
}
