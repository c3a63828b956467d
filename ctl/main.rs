#![forbid(unsafe_code)]

//! `unixsock-ctl`: one-shot command sender for a `unixsock` server.
//!
//! Connects to the control socket, sends a single command with optional
//! `key=value` arguments, prints the response payload, and exits non-zero
//! when the transport or the command fails.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use unixsock::config::{ClientConfig, TransportConfig, DEFAULT_TIMEOUT_MS};
use unixsock::ipc::Client;
use unixsock::{AppError, Arguments, Status, Value};

#[derive(Debug, Parser)]
#[command(
    name = "unixsock-ctl",
    about = "Send a command to a unixsock server",
    version,
    long_about = None
)]
struct Cli {
    /// Path of the server socket.
    #[arg(long)]
    socket: PathBuf,

    /// Per-operation deadline in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Command argument as `key=value`; values that parse as JSON keep
    /// their type, anything else is sent as a string. Repeatable.
    #[arg(long = "arg", value_parser = parse_argument)]
    arguments: Vec<(String, Value)>,

    /// Do not wait for a response.
    #[arg(long)]
    no_response: bool,

    /// Command to send.
    command: String,
}

fn main() {
    let args = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Failed to reach server: {err}");
            std::process::exit(2);
        }
    }
}

fn run(args: Cli) -> Result<i32, AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;

    let transport = TransportConfig::default().with_timeout(Duration::from_millis(args.timeout_ms));
    let mut client = Client::new(ClientConfig::new(args.socket).with_transport(transport));
    let arguments: Arguments = args.arguments.into_iter().collect();

    let response = runtime.block_on(async {
        let response = client
            .send(&args.command, arguments, !args.no_response, true)
            .await;
        client.quit().await;
        response
    })?;

    let Some(response) = response else {
        return Ok(0);
    };

    match response.status {
        Status::Success => {
            if !response.payload.is_empty() {
                println!("{}", response.payload);
            }
            Ok(0)
        }
        Status::Failure => {
            eprintln!("Error: {}", response.error);
            Ok(1)
        }
    }
}

fn parse_argument(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err("argument key must not be empty".into());
    }

    let value = serde_json::from_str::<serde_json::Value>(value)
        .ok()
        .and_then(|json| Value::try_from(json).ok())
        .unwrap_or_else(|| Value::from(value));

    Ok((key.to_owned(), value))
}
