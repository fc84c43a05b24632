//! Server configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the fleet hub server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `8765`; `0` auto-assigns, used by tests).
    pub port: u16,
    /// Per-connection outbound queue depth; sends beyond it are dropped.
    pub max_send_queue: usize,
    /// Default deadline for `send_command`, in seconds.
    pub command_timeout_secs: u64,
    /// Interval between WebSocket pings from the writer task, in seconds.
    pub ping_interval_secs: u64,
}

impl ServerConfig {
    /// Default command deadline as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8765,
            max_send_queue: 256,
            command_timeout_secs: 30,
            ping_interval_secs: 30,
        }
    }
}
