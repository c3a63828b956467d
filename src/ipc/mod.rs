//! Local IPC layer: framing, connections, server, and client.
//!
//! Peers exchange length-prefixed JSON envelopes over a UNIX domain socket
//! (a named local socket on other platforms) using the `interprocess` crate.
//! Access control is left to the filesystem permissions of the socket path.

pub mod client;
pub mod codec;
pub mod connection;
pub mod registry;
pub mod server;

pub use client::Client;
pub use codec::{decode_frame, encode_frame, FrameCodec};
pub use connection::Connection;
pub use registry::{SessionRegistry, ShutdownReport};
pub use server::{CommandHandler, Server};
