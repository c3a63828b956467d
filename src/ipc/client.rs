//! Request/response client with opportunistic connection reuse.
//!
//! A [`Client`] holds at most one connection. A send reuses it while it is
//! younger than the configured freshness window; otherwise the old
//! connection is closed and a new one dialed. The held connection is also
//! dropped after any transport error, since its stream position is then
//! unknown, and after an exchange that asked the server to close.

use tracing::debug;

use crate::config::ClientConfig;
use crate::ipc::connection::Connection;
use crate::models::{Arguments, Envelope, Response};
use crate::{AppError, Result};

/// Client for one server socket.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    connection: Option<Connection>,
}

impl Client {
    /// Client for `config.socket_path`. Nothing is dialed until the first send.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    /// Settings this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether a connection is currently held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Send `command` using the configured default flags.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn call(
        &mut self,
        command: &str,
        arguments: Arguments,
    ) -> Result<Option<Response>> {
        let expect_response = self.config.expect_response;
        let close_after_this = self.config.close_after_this;
        self.send(command, arguments, expect_response, close_after_this)
            .await
    }

    /// Send `command` and, if `expect_response` is set, wait for the reply.
    ///
    /// Returns `Ok(None)` as soon as the write completes when no response
    /// was requested. A handler failure comes back as `Ok(Some(response))`
    /// with a failure status.
    ///
    /// # Errors
    ///
    /// - `AppError::Dial` if the server socket cannot be reached.
    /// - `AppError::Timeout` if connect, write, or read exceeds the deadline.
    /// - `AppError::Framing` / `AppError::Decode` if the reply is malformed or
    ///   the server closed the connection.
    /// - `AppError::ShortWrite` / `AppError::Io` if the write fails.
    pub async fn send(
        &mut self,
        command: &str,
        arguments: Arguments,
        expect_response: bool,
        close_after_this: bool,
    ) -> Result<Option<Response>> {
        self.reconnect().await?;

        let request = Envelope::request(command, arguments, expect_response, close_after_this);
        let outcome = self.exchange(request).await;

        match &outcome {
            Err(err) => {
                debug!(%err, command, "exchange failed, dropping connection");
                self.connection = None;
            }
            Ok(_) if close_after_this => self.quit().await,
            Ok(_) => {}
        }

        outcome
    }

    /// Close the held connection, if any.
    pub async fn quit(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(err) = connection.close().await {
                debug!(%err, "closing connection failed");
            }
        }
    }

    async fn reconnect(&mut self) -> Result<()> {
        if let Some(connection) = &self.connection {
            if connection.age() < self.config.freshness() {
                return Ok(());
            }
        }

        if let Some(stale) = self.connection.take() {
            debug!(age = ?stale.age(), "closing superseded connection");
            if let Err(err) = stale.close().await {
                debug!(%err, "closing superseded connection failed");
            }
        }

        let connection =
            Connection::dial(&self.config.socket_path, &self.config.transport).await?;
        self.connection = Some(connection);
        Ok(())
    }

    async fn exchange(&mut self, request: Envelope) -> Result<Option<Response>> {
        let expect_response = request.expect_response;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| AppError::Dial("no connection held".into()))?;

        connection.transmit(request).await?;
        if !expect_response {
            return Ok(None);
        }

        let reply = connection.receive().await?;
        reply
            .response
            .map(Some)
            .ok_or_else(|| AppError::Decode("reply carried no response".into()))
    }
}
