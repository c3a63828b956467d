//! One framed local-socket stream with per-operation deadlines.
//!
//! Shared by both ends: the client dials one, the server wraps every
//! accepted stream in one. A connection carries at most one transfer at a
//! time; every read and write gets its own deadline.

use std::path::Path;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use interprocess::local_socket::tokio::{prelude::*, Stream};
use interprocess::local_socket::{GenericFilePath, ToFsName};
use tokio::time::{self, Instant};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::config::TransportConfig;
use crate::ipc::codec::FrameCodec;
use crate::models::Envelope;
use crate::{AppError, Result};

/// A bidirectional, framed connection to a peer.
pub struct Connection {
    framed: Framed<Stream, FrameCodec>,
    timeout: Duration,
    established: Instant,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("timeout", &self.timeout)
            .field("age", &self.age())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Connect to the server listening on `socket_path`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Dial` if the socket cannot be reached and
    /// `AppError::Timeout` if connecting exceeds the transport deadline.
    pub async fn dial(socket_path: &Path, transport: &TransportConfig) -> Result<Self> {
        let name = socket_path.to_fs_name::<GenericFilePath>().map_err(|err| {
            AppError::Dial(format!(
                "invalid socket path '{}': {err}",
                socket_path.display()
            ))
        })?;

        let stream = match time::timeout(transport.timeout(), Stream::connect(name)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                return Err(AppError::Dial(format!(
                    "cannot connect to '{}': {err}",
                    socket_path.display()
                )))
            }
            Err(_) => {
                return Err(AppError::Timeout(format!(
                    "connecting to '{}' exceeded {} ms",
                    socket_path.display(),
                    transport.timeout_ms
                )))
            }
        };

        debug!(socket_path = %socket_path.display(), "connection established");
        Ok(Self::from_stream(stream, transport))
    }

    /// Wrap an already connected stream.
    #[must_use]
    pub fn from_stream(stream: Stream, transport: &TransportConfig) -> Self {
        Self {
            framed: Framed::new(stream, FrameCodec::new(transport.max_frame_length)),
            timeout: transport.timeout(),
            established: Instant::now(),
        }
    }

    /// Time since the connection was established.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.established.elapsed()
    }

    /// Read the next envelope from the peer.
    ///
    /// # Errors
    ///
    /// - `AppError::Timeout` if no complete frame arrives within the deadline.
    /// - `AppError::Framing` if the peer closed the stream or sent a bad frame.
    /// - `AppError::Decode` if the frame payload is not an envelope.
    pub async fn receive(&mut self) -> Result<Envelope> {
        match time::timeout(self.timeout, self.framed.next()).await {
            Ok(Some(result)) => result,
            Ok(None) => Err(AppError::Framing("connection closed by peer".into())),
            Err(_) => Err(AppError::Timeout(format!(
                "read exceeded {} ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Encode `envelope` and write it to the peer.
    ///
    /// # Errors
    ///
    /// - `AppError::Timeout` if the write does not complete within the deadline.
    /// - `AppError::Framing` / `AppError::Encode` if the envelope cannot be framed.
    /// - `AppError::ShortWrite` or `AppError::Io` if the stream rejects the bytes.
    pub async fn transmit(&mut self, envelope: Envelope) -> Result<()> {
        match time::timeout(self.timeout, self.framed.send(envelope)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "write exceeded {} ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Flush and shut down the write side, then drop the stream.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Timeout` or `AppError::Io` if the shutdown fails.
    pub async fn close(mut self) -> Result<()> {
        match time::timeout(self.timeout, SinkExt::<Envelope>::close(&mut self.framed)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "close exceeded {} ms",
                self.timeout.as_millis()
            ))),
        }
    }
}
