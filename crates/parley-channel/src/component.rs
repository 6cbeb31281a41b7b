//! `ChannelComponent`: join, leave, and disconnect cleanup.
//!
//! # Locking
//!
//! Two kinds of lock, always taken in this order:
//!
//! 1. the registry (`channels`), held only to look up, insert or remove
//!    entries;
//! 2. one channel's roster lock, inside [`ChatChannel`].
//!
//! Neither is held while sending or while observers run. Sends happen
//! under the channel's delivery guard, and the registry is never locked
//! while a delivery guard is held.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use parley_component::{
    Component, ComponentError, HandleError, RemoteClient, ServerBinding, ServerContext,
    downcast_component,
};
use parley_protocol::{ChannelMessageType, ChannelResult, ComponentType, TypedBuffer};
use parley_transport::ClientId;
use parley_user::{ChatUser, UserComponent};

use crate::channel::{AddOutcome, Audience, RemoveOutcome};
use crate::events::{ChannelEvent, EventQueue};
use crate::{ChannelConfig, ChannelInfo, ChannelObserver, ChatChannel, is_valid_channel_name};

/// Owns every channel and handles the `Channel` namespace.
pub struct ChannelComponent {
    server: ServerBinding,
    /// Keyed by [`ChannelConfig::key_for`].
    channels: Mutex<HashMap<String, Arc<ChatChannel>>>,
    observers: RwLock<Vec<Arc<dyn ChannelObserver>>>,
    config: ChannelConfig,
}

impl ChannelComponent {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            server: ServerBinding::new(),
            channels: Mutex::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Registers an observer for channel events.
    pub fn add_observer(&self, observer: Arc<dyn ChannelObserver>) {
        self.observers.write().push(observer);
    }

    /// Number of live channels.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Looks up a live channel by name.
    pub fn channel(&self, name: &str) -> Option<Arc<ChatChannel>> {
        let key = self.config.key_for(name);
        let found = self.channels.lock().get(&key).cloned();
        found.filter(|channel| channel.is_enabled())
    }

    pub fn channel_info(&self, name: &str) -> Option<ChannelInfo> {
        self.channel(name).map(|channel| channel.info())
    }

    pub fn is_member(&self, name: &str, client: ClientId) -> bool {
        self.channel(name).is_some_and(|channel| channel.is_member(client))
    }

    pub fn is_operator(&self, name: &str, client: ClientId) -> bool {
        self.channel(name).is_some_and(|channel| channel.is_operator(client))
    }

    fn observers(&self) -> Vec<Arc<dyn ChannelObserver>> {
        self.observers.read().clone()
    }

    // -----------------------------------------------------------------------
    // Join
    // -----------------------------------------------------------------------

    fn join(
        &self,
        server: &dyn ServerContext,
        client: &RemoteClient,
        user: Arc<ChatUser>,
        name: String,
        events: &mut EventQueue,
    ) {
        if !user.is_identified() {
            return reject_join(server, client, user, &name, ChannelResult::NotIdentified, events);
        }
        if !is_valid_channel_name(&name) {
            return reject_join(server, client, user, &name, ChannelResult::InvalidChannelName, events);
        }

        let key = self.config.key_for(&name);
        let audience = if self.config.notify_joiner {
            Audience::Everyone
        } else {
            Audience::Others
        };

        loop {
            let channel = {
                let mut channels = self.channels.lock();
                let found = channels.get(&key).filter(|c| c.is_enabled()).cloned();
                match found {
                    Some(channel) => channel,
                    None => {
                        // Any entry still under this key is a disabled
                        // channel on its way out; the new one replaces it.
                        let channel = Arc::new(ChatChannel::create(
                            name.clone(),
                            key.clone(),
                            Arc::clone(&user),
                        ));
                        let info = channel.info();
                        let delivery = channel.delivery();
                        channels.insert(key.clone(), Arc::clone(&channel));
                        drop(channels);

                        let reply = result_buffer(server, ChannelResult::ChannelCreated);
                        send(server, client.id, ChannelMessageType::JoinChannelComplete, &reply);
                        drop(delivery);

                        tracing::info!(client_id = %client.id, channel = %name, "channel created");
                        events.push(ChannelEvent::JoinCompleted(
                            ChannelResult::ChannelCreated,
                            Arc::clone(&user),
                        ));
                        events.push(ChannelEvent::Created(info.clone()));
                        events.push(ChannelEvent::Joined(info, user));
                        return;
                    }
                }
            };

            match channel.add_member(Arc::clone(&user), audience) {
                AddOutcome::Disabled => {
                    tracing::trace!(client_id = %client.id, channel = %name, "channel closed during join, retrying");
                    continue;
                }
                AddOutcome::AlreadyMember => {
                    return reject_join(
                        server,
                        client,
                        user,
                        &name,
                        ChannelResult::AlreadyInChannel,
                        events,
                    );
                }
                AddOutcome::Added {
                    snapshot,
                    recipients,
                    info,
                    delivery,
                } => {
                    let mut reply = result_buffer(server, ChannelResult::Ok);
                    snapshot.write_to(&mut reply);
                    send(server, client.id, ChannelMessageType::JoinChannelComplete, &reply);

                    let notice = membership_notice(server, ChannelResult::UserJoined, &user);
                    broadcast(server, &recipients, ChannelMessageType::JoinChannel, &notice);
                    drop(delivery);

                    tracing::info!(
                        client_id = %client.id,
                        channel = %info.name,
                        members = info.member_count,
                        "user joined channel"
                    );
                    events.push(ChannelEvent::JoinCompleted(ChannelResult::Ok, Arc::clone(&user)));
                    events.push(ChannelEvent::Joined(info, user));
                    return;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Leave
    // -----------------------------------------------------------------------

    fn leave(
        &self,
        server: &dyn ServerContext,
        client: &RemoteClient,
        user: Arc<ChatUser>,
        name: String,
        events: &mut EventQueue,
    ) {
        if !user.is_identified() {
            return reject_leave(server, client, user, &name, ChannelResult::NotIdentified, events);
        }
        if !is_valid_channel_name(&name) {
            return reject_leave(server, client, user, &name, ChannelResult::InvalidChannelName, events);
        }

        let key = self.config.key_for(&name);
        let found = self.channels.lock().get(&key).cloned();
        let Some(channel) = found else {
            return reject_leave(server, client, user, &name, ChannelResult::InvalidChannelName, events);
        };

        match channel.remove_member(client.id, Audience::Everyone) {
            RemoveOutcome::Disabled => {
                reject_leave(server, client, user, &name, ChannelResult::InvalidChannelName, events)
            }
            RemoveOutcome::NotMember => {
                reject_leave(server, client, user, &name, ChannelResult::NotInChannel, events)
            }
            RemoveOutcome::Removed {
                user: departed,
                recipients,
                now_empty,
                info,
                delivery,
            } => {
                let notice = membership_notice(server, ChannelResult::UserLeft, &departed);
                broadcast(server, &recipients, ChannelMessageType::LeaveChannel, &notice);
                drop(delivery);

                tracing::info!(client_id = %client.id, channel = %info.name, "user left channel");
                events.push(ChannelEvent::Left(info, departed));
                if now_empty {
                    self.release(&channel);
                }

                let mut reply = result_buffer(server, ChannelResult::Ok);
                reply.write_string(&name);
                send(server, client.id, ChannelMessageType::LeaveChannelComplete, &reply);
                events.push(ChannelEvent::LeaveCompleted(ChannelResult::Ok, user));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Registry maintenance
    // -----------------------------------------------------------------------

    /// Drops an emptied channel from the registry, unless a successor has
    /// already taken its key.
    fn release(&self, channel: &Arc<ChatChannel>) {
        let mut channels = self.channels.lock();
        let current = channels
            .get(channel.key())
            .is_some_and(|entry| Arc::ptr_eq(entry, channel));
        if current {
            channels.remove(channel.key());
            tracing::info!(channel = %channel.name(), "channel removed");
        }
    }

    /// Closes and forgets every channel.
    fn clear(&self) {
        let drained: Vec<Arc<ChatChannel>> = self.channels.lock().drain().map(|(_, c)| c).collect();
        for channel in &drained {
            channel.close();
        }
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "channel registry cleared");
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound helpers
// ---------------------------------------------------------------------------

fn send(server: &dyn ServerContext, client: ClientId, message_type: ChannelMessageType, buffer: &TypedBuffer) {
    server.send_unicast(client, ComponentType::Channel, message_type.into(), buffer);
}

fn broadcast(
    server: &dyn ServerContext,
    recipients: &[ClientId],
    message_type: ChannelMessageType,
    buffer: &TypedBuffer,
) {
    for &client in recipients {
        send(server, client, message_type, buffer);
    }
}

fn result_buffer(server: &dyn ServerContext, result: ChannelResult) -> TypedBuffer {
    let mut buffer = server.create_buffer();
    buffer.write_u16(result.into());
    buffer
}

/// `{ result, username, hostname }`, the payload of join and leave
/// broadcasts.
fn membership_notice(server: &dyn ServerContext, result: ChannelResult, user: &ChatUser) -> TypedBuffer {
    let mut buffer = result_buffer(server, result);
    buffer.write_string(&user.username());
    buffer.write_string(user.hostname());
    buffer
}

fn reject_join(
    server: &dyn ServerContext,
    client: &RemoteClient,
    user: Arc<ChatUser>,
    name: &str,
    result: ChannelResult,
    events: &mut EventQueue,
) {
    tracing::debug!(client_id = %client.id, channel = %name, %result, "join refused");
    let reply = result_buffer(server, result);
    send(server, client.id, ChannelMessageType::JoinChannelComplete, &reply);
    events.push(ChannelEvent::JoinCompleted(result, user));
}

fn reject_leave(
    server: &dyn ServerContext,
    client: &RemoteClient,
    user: Arc<ChatUser>,
    name: &str,
    result: ChannelResult,
    events: &mut EventQueue,
) {
    tracing::debug!(client_id = %client.id, channel = %name, %result, "leave refused");
    let reply = result_buffer(server, result);
    send(server, client.id, ChannelMessageType::LeaveChannelComplete, &reply);
    events.push(ChannelEvent::LeaveCompleted(result, user));
}

/// Finds the requesting client's user record through the user component.
fn resolve_user(server: &dyn ServerContext, client: ClientId) -> Result<Arc<ChatUser>, HandleError> {
    let unavailable = || HandleError::ComponentUnavailable(ComponentType::User);
    let component = server.component(ComponentType::User).ok_or_else(unavailable)?;
    let users = downcast_component::<UserComponent>(&component).ok_or_else(unavailable)?;
    users.chat_user(client).ok_or(HandleError::UnknownUser(client))
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

#[async_trait]
impl Component for ChannelComponent {
    fn component_type(&self) -> ComponentType {
        ComponentType::Channel
    }

    fn initialize(&self, server: Weak<dyn ServerContext>) -> Result<(), ComponentError> {
        self.server.bind(ComponentType::Channel, server)
    }

    fn shutdown(&self) {
        self.clear();
        self.server.clear();
    }

    fn on_stop(&self) {
        self.clear();
    }

    fn on_client_disconnected(&self, client: &RemoteClient) {
        // Without a server there is nobody left to notify, but the rosters
        // still have to forget the client.
        let server = self.server.get().ok();
        let channels: Vec<Arc<ChatChannel>> = self.channels.lock().values().cloned().collect();
        let mut events = EventQueue::new();

        for channel in channels {
            let RemoveOutcome::Removed {
                user,
                recipients,
                now_empty,
                info,
                delivery,
            } = channel.remove_member(client.id, Audience::Others)
            else {
                continue;
            };

            if let Some(server) = &server {
                let notice = membership_notice(server.as_ref(), ChannelResult::UserLeft, &user);
                broadcast(server.as_ref(), &recipients, ChannelMessageType::LeaveChannel, &notice);
            }
            drop(delivery);

            tracing::debug!(client_id = %client.id, channel = %info.name, "disconnected user removed from channel");
            events.push(ChannelEvent::Left(info, user));
            if now_empty {
                self.release(&channel);
            }
        }

        events.dispatch(&self.observers());
    }

    async fn handle(
        &self,
        client: &RemoteClient,
        message_type: u16,
        buffer: &mut TypedBuffer,
    ) -> Result<(), HandleError> {
        let server = self.server.get()?;
        let kind = match ChannelMessageType::try_from(message_type) {
            Ok(kind @ (ChannelMessageType::JoinChannel | ChannelMessageType::LeaveChannel)) => kind,
            _ => return Err(HandleError::UnknownMessageType(ComponentType::Channel, message_type)),
        };

        let name = buffer.read_string()?;
        let user = resolve_user(server.as_ref(), client.id)?;

        let mut events = EventQueue::new();
        if kind == ChannelMessageType::JoinChannel {
            self.join(server.as_ref(), client, user, name, &mut events);
        } else {
            self.leave(server.as_ref(), client, user, name, &mut events);
        }
        events.dispatch(&self.observers());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
