//! Server configuration, loadable from a JSON file.
//!
//! Every field has a default, so a config file only needs to name the
//! settings it overrides. Command-line flags are applied on top by the
//! binary after loading.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::network::DEFAULT_MAX_FRAME_BYTES;

/// Default port of the management endpoint.
pub const DEFAULT_PORT: u16 = 9990;

/// Top-level configuration for the management server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the management endpoint binds to.
    pub bind_addr: SocketAddr,
    /// Host name registered during boot. When unset, no host is registered
    /// and `add-host` stays available until boot completes.
    pub host_name: Option<String>,
    /// Optional JSON file of operations replayed during boot.
    pub boot_file: Option<PathBuf>,
    /// Maximum time to wait for in-flight operations during shutdown,
    /// in milliseconds.
    pub drain_timeout_ms: u64,
    /// Per-connection settings.
    pub connection: ConnectionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            host_name: None,
            boot_file: None,
            drain_timeout_ms: 5_000,
            connection: ConnectionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse as a
    /// configuration document.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Drain timeout as a [`Duration`].
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Per-connection configuration controlling backpressure and limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Bounded mpsc channel capacity for outbound frames per connection.
    pub outbound_channel_capacity: usize,
    /// Maximum time to wait when queueing a response for a slow connection,
    /// in milliseconds.
    pub send_timeout_ms: u64,
    /// Connections beyond this limit are refused at accept time.
    pub max_connections: usize,
    /// A connection is closed when its peer streams a single frame larger
    /// than this many bytes.
    pub max_frame_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_channel_capacity: 256,
            send_timeout_ms: 5_000,
            max_connections: 256,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ConnectionConfig {
    /// Send timeout as a [`Duration`].
    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}
