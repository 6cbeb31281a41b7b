//! Server configuration, loaded from TOML.
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//! idle_timeout_secs = 300
//! handshake_timeout_secs = 10
//! outbound_queue_len = 256
//! log_filter = "parley=debug"
//!
//! [channel]
//! case_sensitive = false
//!
//! [user]
//! guest_prefix = "visitor"
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::path::Path;
use std::time::Duration;

use parley_channel::ChannelConfig;
use parley_user::UserConfig;
use serde::Deserialize;

use crate::ParleyError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,

    /// Disconnect a client after this many seconds without a message.
    /// `0` disables the timeout.
    pub idle_timeout_secs: u64,

    /// Drop a socket that has not finished the WebSocket upgrade after
    /// this many seconds. `0` disables the timeout.
    pub handshake_timeout_secs: u64,

    /// Frames queued for one client before it counts as too slow and is
    /// disconnected.
    pub outbound_queue_len: usize,

    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,

    pub channel: ChannelConfig,

    pub user: UserConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            idle_timeout_secs: 300,
            handshake_timeout_secs: 10,
            outbound_queue_len: 256,
            log_filter: "parley=info".to_string(),
            channel: ChannelConfig::default(),
            user: UserConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads and parses a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParleyError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ParleyError> {
        Ok(toml::from_str(text)?)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        (self.handshake_timeout_secs > 0).then(|| Duration::from_secs(self.handshake_timeout_secs))
    }

    /// Capacity of each client's outbound queue, never zero.
    pub fn outbound_queue_len(&self) -> usize {
        self.outbound_queue_len.max(1)
    }
}
