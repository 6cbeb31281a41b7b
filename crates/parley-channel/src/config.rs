//! Channel component settings.

use serde::Deserialize;

/// The character every channel name must contain.
pub const CHANNEL_DELIMITER: char = '#';

/// Configuration for the channel component.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// When `false`, `#General` and `#general` name the same channel.
    pub case_sensitive: bool,

    /// Whether a joiner also receives its own `UserJoined` broadcast.
    pub notify_joiner: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            notify_joiner: false,
        }
    }
}

impl ChannelConfig {
    /// The registry key a channel name is stored under.
    pub fn key_for(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }
}

/// `true` if `name` is acceptable as a channel name.
pub fn is_valid_channel_name(name: &str) -> bool {
    name.contains(CHANNEL_DELIMITER)
}
