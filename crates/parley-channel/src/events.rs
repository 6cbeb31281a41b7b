//! Channel events and the observer hook.
//!
//! Operations collect their events into an [`EventQueue`] while they hold
//! locks and hand it to [`EventQueue::dispatch`] only once every lock is
//! released, so an observer is free to call back into the component.

use std::sync::Arc;

use parley_protocol::ChannelResult;
use parley_user::ChatUser;

use crate::ChannelInfo;

/// Receives channel lifecycle and membership events.
///
/// All methods default to no-ops; implement the ones you care about.
pub trait ChannelObserver: Send + Sync {
    fn on_channel_created(&self, _channel: &ChannelInfo) {}

    fn on_channel_joined(&self, _channel: &ChannelInfo, _user: &ChatUser) {}

    fn on_channel_left(&self, _channel: &ChannelInfo, _user: &ChatUser) {}

    /// Fired for every join request, successful or not.
    fn on_join_completed(&self, _result: ChannelResult, _user: &ChatUser) {}

    /// Fired for every leave request, successful or not.
    fn on_leave_completed(&self, _result: ChannelResult, _user: &ChatUser) {}
}

#[derive(Debug, Clone)]
pub(crate) enum ChannelEvent {
    Created(ChannelInfo),
    Joined(ChannelInfo, Arc<ChatUser>),
    Left(ChannelInfo, Arc<ChatUser>),
    JoinCompleted(ChannelResult, Arc<ChatUser>),
    LeaveCompleted(ChannelResult, Arc<ChatUser>),
}

/// Events produced by one operation, in the order they happened.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    events: Vec<ChannelEvent>,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, event: ChannelEvent) {
        self.events.push(event);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    /// Delivers every queued event to every observer.
    pub(crate) fn dispatch(self, observers: &[Arc<dyn ChannelObserver>]) {
        if observers.is_empty() {
            return;
        }
        for event in &self.events {
            for observer in observers {
                match event {
                    ChannelEvent::Created(info) => observer.on_channel_created(info),
                    ChannelEvent::Joined(info, user) => observer.on_channel_joined(info, user),
                    ChannelEvent::Left(info, user) => observer.on_channel_left(info, user),
                    ChannelEvent::JoinCompleted(result, user) => {
                        observer.on_join_completed(*result, user)
                    }
                    ChannelEvent::LeaveCompleted(result, user) => {
                        observer.on_leave_completed(*result, user)
                    }
                }
            }
        }
    }
}
