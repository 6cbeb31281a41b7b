//! The `ChatUser` record and user configuration.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use parley_transport::ClientId;
use serde::Deserialize;

/// Settings for the user component.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Longest username accepted by `Identify`, in characters.
    pub max_username_len: usize,
    /// Prefix for the names handed to clients that haven't identified.
    pub guest_prefix: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            max_username_len: 32,
            guest_prefix: "guest".to_string(),
        }
    }
}

impl UserConfig {
    /// Checks a requested username against the naming rules.
    ///
    /// Names must be non-empty, at most `max_username_len` characters,
    /// free of whitespace, and must not contain the channel delimiter `#`.
    pub fn is_valid_username(&self, name: &str) -> bool {
        !name.is_empty()
            && name.chars().count() <= self.max_username_len
            && !name.chars().any(|c| c.is_whitespace() || c == '#')
    }
}

/// One connected client's identity.
///
/// Shared as `Arc<ChatUser>` between the registry and every channel
/// roster the client is in. The registry is the only writer; everyone
/// else reads.
#[derive(Debug)]
pub struct ChatUser {
    client_id: ClientId,
    hostname: String,
    username: RwLock<String>,
    identified: AtomicBool,
    enabled: AtomicBool,
}

impl ChatUser {
    /// Creates an enabled, unidentified user.
    pub fn new(client_id: ClientId, username: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            client_id,
            hostname: hostname.into(),
            username: RwLock::new(username.into()),
            identified: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn username(&self) -> String {
        self.username.read().clone()
    }

    /// `true` once the client has successfully identified.
    pub fn is_identified(&self) -> bool {
        self.identified.load(Ordering::Acquire)
    }

    /// `true` while the client is connected. Broadcasts skip disabled
    /// users.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Claims `username` and marks the user identified.
    pub(crate) fn identify(&self, username: String) {
        *self.username.write() = username;
        self.identified.store(true, Ordering::Release);
    }

    pub(crate) fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }
}
