//! Channels for Parley.
//!
//! Channels are created on first join, shared by every member, and torn
//! down when the last member leaves or disconnects.
//!
//! # Key types
//!
//! - [`ChannelComponent`]: the `Channel` namespace handler and channel registry
//! - [`ChatChannel`]: one channel, its rosters, and the lock guarding them
//! - [`ChannelObserver`]: hook for join/leave/lifecycle events
//! - [`ChannelConfig`]: naming and notification settings
//!
//! # Wire messages
//!
//! | Direction | Type | Payload |
//! |---|---|---|
//! | client → server | `JoinChannel` | `name` |
//! | server → client | `JoinChannelComplete` | `result, [operators, members]` |
//! | server → client | `JoinChannel` | `UserJoined, username, hostname` |
//! | client → server | `LeaveChannel` | `name` |
//! | server → client | `LeaveChannelComplete` | `result, [name]` |
//! | server → client | `LeaveChannel` | `UserLeft, username, hostname` |

mod channel;
mod component;
mod config;
mod events;

pub use channel::{
    AddOutcome, Audience, ChannelInfo, ChannelSnapshot, ChatChannel, Delivery, RemoveOutcome,
    RosterEntry,
};
pub use component::ChannelComponent;
pub use config::{CHANNEL_DELIMITER, ChannelConfig, is_valid_channel_name};
pub use events::ChannelObserver;
