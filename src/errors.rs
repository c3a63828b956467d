//! Error types shared across the crate.

use std::fmt::{Display, Formatter};
use std::io;

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering every transport failure mode.
///
/// Application-level failures reported by a command handler are not
/// represented here: they travel as a successfully transmitted response
/// with `Status::Failure`.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The server socket path could not be bound.
    Bind(String),
    /// The client could not reach the server socket.
    Dial(String),
    /// Short read, bad delimiter, oversized frame, or peer closed mid-session.
    Framing(String),
    /// Frame payload is not a valid envelope.
    Decode(String),
    /// Envelope could not be serialized.
    Encode(String),
    /// A read, write, or connect exceeded its deadline.
    Timeout(String),
    /// Fewer bytes were written than the frame required.
    ShortWrite(String),
    /// Any other I/O failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Bind(msg) => write!(f, "bind: {msg}"),
            Self::Dial(msg) => write!(f, "dial: {msg}"),
            Self::Framing(msg) => write!(f, "framing: {msg}"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::Encode(msg) => write!(f, "encode: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::ShortWrite(msg) => write!(f, "short write: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Whether the error ended the exchange because a deadline expired.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => Self::Timeout(err.to_string()),
            io::ErrorKind::WriteZero => Self::ShortWrite(err.to_string()),
            io::ErrorKind::UnexpectedEof => Self::Framing(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}
