//! Configuration values for servers and clients, and TOML loading.
//!
//! Every value here is immutable once built: constructors apply the
//! defaults and `with_*` methods consume and return an adjusted copy.
//! Per-call overrides (such as the response/close flags of a single send)
//! are explicit method parameters, never shared mutable state.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Default maximum encoded payload length: 1 MiB.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 1 << 20;

/// Default per-operation deadline in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default client connection freshness window in milliseconds.
pub const DEFAULT_FRESHNESS_MS: u64 = 5_000;

/// Default grace period granted to open sessions on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;

fn default_max_frame_length() -> usize {
    DEFAULT_MAX_FRAME_LENGTH
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_freshness_ms() -> u64 {
    DEFAULT_FRESHNESS_MS
}

fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}

fn default_true() -> bool {
    true
}

/// Framing and deadline settings shared by both ends of a connection.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TransportConfig {
    /// Largest encoded payload accepted or produced, in bytes.
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,
    /// Deadline applied to each individual read, write, or connect.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl TransportConfig {
    /// Per-operation deadline as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Copy with a different maximum frame length.
    #[must_use]
    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    /// Copy with a different per-operation deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_frame_length == 0 {
            return Err(AppError::Config(
                "max_frame_length must be greater than zero".into(),
            ));
        }
        if u32::try_from(self.max_frame_length).is_err() {
            return Err(AppError::Config(format!(
                "max_frame_length must fit the 4-byte length prefix (max {})",
                u32::MAX
            )));
        }
        if self.timeout_ms == 0 {
            return Err(AppError::Config(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for one [`Server`](crate::ipc::server::Server) instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Filesystem path the listener binds.
    pub socket_path: PathBuf,
    /// Framing and deadline settings applied to every session.
    pub transport: TransportConfig,
    /// How long [`Server::shutdown`](crate::ipc::server::Server::shutdown)
    /// waits for sessions when driven from configuration.
    pub shutdown_grace_ms: u64,
}

impl ServerConfig {
    /// Server settings for `socket_path` with every other value defaulted.
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            transport: TransportConfig::default(),
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }

    /// Copy with different transport settings.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Configured shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Settings for one [`Client`](crate::ipc::client::Client) instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Filesystem path of the server socket.
    pub socket_path: PathBuf,
    /// Framing and deadline settings applied to every exchange.
    pub transport: TransportConfig,
    /// Age below which a held connection is reused instead of redialed.
    pub freshness_ms: u64,
    /// Response flag used by [`Client::call`](crate::ipc::client::Client::call).
    pub expect_response: bool,
    /// Close flag used by [`Client::call`](crate::ipc::client::Client::call).
    pub close_after_this: bool,
}

impl ClientConfig {
    /// Client settings for `socket_path` with every other value defaulted.
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            transport: TransportConfig::default(),
            freshness_ms: DEFAULT_FRESHNESS_MS,
            expect_response: true,
            close_after_this: true,
        }
    }

    /// Copy with different transport settings.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Copy with a different freshness window.
    #[must_use]
    pub fn with_freshness(mut self, window: Duration) -> Self {
        self.freshness_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Copy with different default flags for [`Client::call`](crate::ipc::client::Client::call).
    #[must_use]
    pub fn with_defaults(mut self, expect_response: bool, close_after_this: bool) -> Self {
        self.expect_response = expect_response;
        self.close_after_this = close_after_this;
        self
    }

    /// Freshness window as a [`Duration`].
    #[must_use]
    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }
}

/// Client-side defaults as they appear in the `[client]` TOML table.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClientDefaults {
    /// Connection reuse window.
    #[serde(default = "default_freshness_ms")]
    pub freshness_ms: u64,
    /// Default response flag.
    #[serde(default = "default_true")]
    pub expect_response: bool,
    /// Default close flag.
    #[serde(default = "default_true")]
    pub close_after_this: bool,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            freshness_ms: DEFAULT_FRESHNESS_MS,
            expect_response: true,
            close_after_this: true,
        }
    }
}

/// Global configuration parsed from a TOML file.
///
/// ```toml
/// socket_path = "/run/myapp/control.sock"
/// shutdown_grace_ms = 2000
///
/// [transport]
/// max_frame_length = 1048576
/// timeout_ms = 5000
///
/// [client]
/// freshness_ms = 5000
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Filesystem path of the control socket.
    pub socket_path: PathBuf,
    /// Framing and deadline settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Client reuse window and default flags.
    #[serde(default)]
    pub client: ClientDefaults,
    /// Grace period for open sessions on shutdown.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Server settings projected from this configuration.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            socket_path: self.socket_path.clone(),
            transport: self.transport,
            shutdown_grace_ms: self.shutdown_grace_ms,
        }
    }

    /// Client settings projected from this configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            socket_path: self.socket_path.clone(),
            transport: self.transport,
            freshness_ms: self.client.freshness_ms,
            expect_response: self.client.expect_response,
            close_after_this: self.client.close_after_this,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(AppError::Config("socket_path must not be empty".into()));
        }
        self.transport.validate()?;
        if self.client.freshness_ms == 0 {
            return Err(AppError::Config(
                "client.freshness_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
