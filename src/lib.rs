#![forbid(unsafe_code)]

//! `unixsock`: a control and monitoring channel for long-running local
//! processes, served over a UNIX domain socket to trusted local clients.

pub mod config;
pub mod errors;
pub mod ipc;
pub mod models;

pub use config::{ClientConfig, GlobalConfig, ServerConfig, TransportConfig};
pub use errors::{AppError, Result};
pub use models::{Arguments, Envelope, Response, Status, Value};
