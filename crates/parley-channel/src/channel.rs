//! The `ChatChannel` entity.
//!
//! A channel owns one lock covering its `enabled` flag and both rosters.
//! Every membership change, and the recipient list and roster snapshot
//! it produces, happens inside a single critical section of that lock,
//! so notifications always describe a state the channel actually passed
//! through.
//!
//! The roster lock is never held while sending. Instead a mutation that
//! produces notifications also takes the channel's *delivery* guard before
//! releasing the roster lock, and the caller sends while holding it. The
//! next mutation can proceed immediately, but its notifications queue up
//! behind the previous ones, so every client sees this channel's events in
//! the order they happened.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use parley_protocol::TypedBuffer;
use parley_transport::ClientId;
use parley_user::ChatUser;

// ---------------------------------------------------------------------------
// Read views
// ---------------------------------------------------------------------------

/// One `(username, hostname)` pair as written into a roster snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub username: String,
    pub hostname: String,
}

impl RosterEntry {
    fn of(user: &ChatUser) -> Self {
        Self {
            username: user.username(),
            hostname: user.hostname().to_string(),
        }
    }
}

/// The rosters a joiner receives in its `Ok` reply.
///
/// Only enabled users appear, sorted by username.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub operators: Vec<RosterEntry>,
    pub members: Vec<RosterEntry>,
}

impl ChannelSnapshot {
    /// Appends `count, (username, hostname)*` for operators, then members.
    ///
    /// Counts are the number of entries actually written.
    pub fn write_to(&self, buffer: &mut TypedBuffer) {
        for roster in [&self.operators, &self.members] {
            buffer.write_u32(roster.len() as u32);
            for entry in roster {
                buffer.write_string(&entry.username);
                buffer.write_string(&entry.hostname);
            }
        }
    }
}

/// Summary of a channel handed to observers and introspection callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub member_count: usize,
    /// Operator usernames, sorted.
    pub operators: Vec<String>,
}

/// Who receives a membership broadcast besides the other members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// The client that caused the change is notified too.
    Everyone,
    /// Only the other enabled members are notified.
    Others,
}

/// Held while a membership change's notifications are sent.
///
/// Dropping it lets the next change on the same channel deliver.
#[must_use = "notifications must be sent before the delivery guard is dropped"]
pub struct Delivery<'a> {
    _guard: MutexGuard<'a, ()>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of [`ChatChannel::add_member`].
pub enum AddOutcome<'a> {
    Added {
        snapshot: ChannelSnapshot,
        recipients: Vec<ClientId>,
        info: ChannelInfo,
        delivery: Delivery<'a>,
    },
    AlreadyMember,
    /// The channel emptied out between lookup and insert.
    Disabled,
}

/// Result of [`ChatChannel::remove_member`].
pub enum RemoveOutcome<'a> {
    Removed {
        /// The roster's record of the departing user.
        user: Arc<ChatUser>,
        recipients: Vec<ClientId>,
        /// The client was the last member and the channel is now disabled.
        now_empty: bool,
        info: ChannelInfo,
        delivery: Delivery<'a>,
    },
    NotMember,
    Disabled,
}

// ---------------------------------------------------------------------------
// ChatChannel
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ChannelState {
    enabled: bool,
    members: HashMap<ClientId, Arc<ChatUser>>,
    operators: HashMap<ClientId, Arc<ChatUser>>,
}

impl ChannelState {
    /// Enabled members, minus `exclude`.
    fn recipients(&self, exclude: Option<ClientId>) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self
            .members
            .iter()
            .filter(|(id, user)| Some(**id) != exclude && user.is_enabled())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    fn snapshot(&self) -> ChannelSnapshot {
        fn roster(users: &HashMap<ClientId, Arc<ChatUser>>) -> Vec<RosterEntry> {
            let mut entries: Vec<RosterEntry> = users
                .values()
                .filter(|user| user.is_enabled())
                .map(|user| RosterEntry::of(user))
                .collect();
            entries.sort_by(|a, b| a.username.cmp(&b.username));
            entries
        }
        ChannelSnapshot {
            operators: roster(&self.operators),
            members: roster(&self.members),
        }
    }

    fn info(&self, name: &str) -> ChannelInfo {
        let mut operators: Vec<String> = self.operators.values().map(|u| u.username()).collect();
        operators.sort();
        ChannelInfo {
            name: name.to_string(),
            member_count: self.members.len(),
            operators,
        }
    }
}

/// A named chat channel and its member and operator rosters.
///
/// Invariants, true whenever the lock is free:
/// - an enabled channel has at least one member;
/// - every operator is also a member;
/// - once disabled, a channel is never enabled again.
#[derive(Debug)]
pub struct ChatChannel {
    name: String,
    key: String,
    state: Mutex<ChannelState>,
    delivery: Mutex<()>,
}

impl ChatChannel {
    /// Creates an enabled channel whose creator is its first member and
    /// first operator.
    pub fn create(name: impl Into<String>, key: impl Into<String>, creator: Arc<ChatUser>) -> Self {
        let id = creator.client_id();
        let mut members = HashMap::new();
        members.insert(id, Arc::clone(&creator));
        let mut operators = HashMap::new();
        operators.insert(id, creator);
        Self {
            name: name.into(),
            key: key.into(),
            state: Mutex::new(ChannelState {
                enabled: true,
                members,
                operators,
            }),
            delivery: Mutex::new(()),
        }
    }

    /// The name as the creator spelled it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registry key this channel is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn is_member(&self, client: ClientId) -> bool {
        self.state.lock().members.contains_key(&client)
    }

    pub fn is_operator(&self, client: ClientId) -> bool {
        self.state.lock().operators.contains_key(&client)
    }

    pub fn member_count(&self) -> usize {
        self.state.lock().members.len()
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        self.state.lock().snapshot()
    }

    pub fn info(&self) -> ChannelInfo {
        self.state.lock().info(&self.name)
    }

    /// Takes the delivery guard without a membership change.
    ///
    /// Used by the creator of a fresh channel so its `ChannelCreated`
    /// reply goes out before anyone else's join is announced.
    pub fn delivery(&self) -> Delivery<'_> {
        Delivery {
            _guard: self.delivery.lock(),
        }
    }

    /// Adds `user` as a plain member.
    ///
    /// On success the snapshot includes the new member, and `recipients`
    /// are the enabled members to tell about the join.
    pub fn add_member(&self, user: Arc<ChatUser>, audience: Audience) -> AddOutcome<'_> {
        let mut state = self.state.lock();
        if !state.enabled {
            return AddOutcome::Disabled;
        }
        let id = user.client_id();
        if state.members.contains_key(&id) {
            return AddOutcome::AlreadyMember;
        }
        state.members.insert(id, user);

        let exclude = match audience {
            Audience::Everyone => None,
            Audience::Others => Some(id),
        };
        AddOutcome::Added {
            snapshot: state.snapshot(),
            recipients: state.recipients(exclude),
            info: state.info(&self.name),
            delivery: Delivery {
                _guard: self.delivery.lock(),
            },
        }
    }

    /// Removes `client` from the members and operators, disabling the
    /// channel if it was the last member.
    ///
    /// `recipients` are computed before the removal, so with
    /// [`Audience::Everyone`] the departing client is included.
    pub fn remove_member(&self, client: ClientId, audience: Audience) -> RemoveOutcome<'_> {
        let mut state = self.state.lock();
        if !state.enabled {
            return RemoveOutcome::Disabled;
        }
        let Some(user) = state.members.get(&client).cloned() else {
            return RemoveOutcome::NotMember;
        };

        let exclude = match audience {
            Audience::Everyone => None,
            Audience::Others => Some(client),
        };
        let recipients = state.recipients(exclude);

        state.members.remove(&client);
        state.operators.remove(&client);
        let now_empty = state.members.is_empty();
        if now_empty {
            state.enabled = false;
        }

        RemoveOutcome::Removed {
            user,
            recipients,
            now_empty,
            info: state.info(&self.name),
            delivery: Delivery {
                _guard: self.delivery.lock(),
            },
        }
    }

    /// Disables the channel and empties both rosters.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.enabled = false;
        state.members.clear();
        state.operators.clear();
    }
}
