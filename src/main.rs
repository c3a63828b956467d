#![forbid(unsafe_code)]

//! `unixsock-server`: serves a demo command handler on a local socket.
//!
//! Loads configuration, binds the control socket, and serves until SIGINT
//! or SIGTERM, then drains open sessions within the configured grace period.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use unixsock::config::{GlobalConfig, ServerConfig};
use unixsock::ipc::Server;
use unixsock::{AppError, Arguments, Response, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "unixsock-server", about = "Local socket control server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Socket path; overrides the configuration file.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match (&args.config, &args.socket) {
        (Some(path), _) => GlobalConfig::load_from_path(path)?.server_config(),
        (None, Some(socket)) => ServerConfig::new(socket.clone()),
        (None, None) => {
            return Err(AppError::Config(
                "either --config or --socket is required".into(),
            ))
        }
    };
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }
    let grace = config.shutdown_grace();

    let server = Server::start(config, demo_handler).await?;
    info!("server ready");

    shutdown_signal().await;
    info!("shutdown signal received");

    let report = server.shutdown(grace).await;
    if !report.drained {
        warn!(cancelled = report.cancelled, "sessions cancelled at shutdown");
    }

    Ok(())
}

/// `ping` answers `pong`; `echo` returns its arguments as JSON.
fn demo_handler(command: &str, arguments: &Arguments) -> Response {
    match command {
        "ping" => Response::success("pong"),
        "echo" => match serde_json::to_string(arguments) {
            Ok(json) => Response::success(json),
            Err(err) => Response::failure(format!("cannot encode arguments: {err}")),
        },
        _ => Response::failure("unknown command"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
