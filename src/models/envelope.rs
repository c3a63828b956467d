//! Envelope model: the unit exchanged on every send.

use serde::{Deserialize, Serialize};

use super::value::Arguments;

/// Outcome of a handled command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The command completed.
    Success,
    /// The command failed; see [`Response::error`].
    Failure,
}

/// Result of running a command through the handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    /// Success or failure.
    pub status: Status,
    /// Human-readable error; empty on success.
    #[serde(default)]
    pub error: String,
    /// Handler-defined payload.
    #[serde(default)]
    pub payload: String,
}

impl Response {
    /// Successful response carrying `payload`.
    #[must_use]
    pub fn success(payload: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            error: String::new(),
            payload: payload.into(),
        }
    }

    /// Failed response carrying `error`.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: Status::Failure,
            error: error.into(),
            payload: String::new(),
        }
    }

    /// Whether the status is [`Status::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// One message on the wire, in either direction.
///
/// Envelopes are built fresh for every transaction and never mutated after
/// they are handed to the codec; a receiver always gets a new value decoded
/// from bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Requested operation; interpreted only by the handler.
    pub command: String,
    /// Schema-less command arguments.
    #[serde(default)]
    pub arguments: Arguments,
    /// Present once the command has been handled.
    #[serde(default)]
    pub response: Option<Response>,
    /// The sender wants a reply.
    pub expect_response: bool,
    /// The connection is torn down after this exchange.
    pub close_after_this: bool,
}

impl Envelope {
    /// Request envelope with no response attached.
    #[must_use]
    pub fn request(
        command: impl Into<String>,
        arguments: Arguments,
        expect_response: bool,
        close_after_this: bool,
    ) -> Self {
        Self {
            command: command.into(),
            arguments,
            response: None,
            expect_response,
            close_after_this,
        }
    }

    /// Reply to `request` carrying `response`.
    ///
    /// Echoes the command and the close flag; arguments are not sent back
    /// and the reply never asks for a reply of its own.
    #[must_use]
    pub fn reply(request: &Envelope, response: Response) -> Self {
        Self {
            command: request.command.clone(),
            arguments: Arguments::new(),
            response: Some(response),
            expect_response: false,
            close_after_this: request.close_after_this,
        }
    }
}
