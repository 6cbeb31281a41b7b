//! An in-memory [`ServerContext`] for component tests.
//!
//! `RecordingServer` keeps a component registry like the real server core
//! but, instead of writing to sockets, records every unicast so tests can
//! assert on exactly who was told what.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use parley_protocol::{ComponentType, TypedBuffer};
use parley_transport::ClientId;

use crate::{Component, ComponentError, ServerContext};

/// One recorded `send_unicast` call.
#[derive(Debug, Clone)]
pub struct SentFrame {
    pub client: ClientId,
    pub component: ComponentType,
    pub message_type: u16,
    /// A fresh read view of the payload.
    pub payload: TypedBuffer,
}

#[derive(Default)]
pub struct RecordingServer {
    components: RwLock<HashMap<ComponentType, Arc<dyn Component>>>,
    sent: Mutex<Vec<SentFrame>>,
}

impl RecordingServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The weak, type-erased handle components are initialized with.
    pub fn context(this: &Arc<Self>) -> Weak<dyn ServerContext> {
        let ctx: Arc<dyn ServerContext> = Arc::clone(this) as Arc<dyn ServerContext>;
        Arc::downgrade(&ctx)
    }

    /// Registers and initializes a component.
    pub fn register(this: &Arc<Self>, component: Arc<dyn Component>) -> Result<(), ComponentError> {
        let ty = component.component_type();
        {
            let mut components = this.components.write();
            if components.contains_key(&ty) {
                return Err(ComponentError::DuplicateComponent(ty));
            }
            components.insert(ty, Arc::clone(&component));
        }
        component.initialize(Self::context(this))
    }

    /// Removes and returns everything sent so far.
    pub fn take_sent(&self) -> Vec<SentFrame> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Removes and returns what was sent to `client`, leaving the rest.
    pub fn take_sent_to(&self, client: ClientId) -> Vec<SentFrame> {
        let mut sent = self.sent.lock();
        let (mine, rest): (Vec<_>, Vec<_>) = sent.drain(..).partition(|f| f.client == client);
        *sent = rest;
        mine
    }
}

impl ServerContext for RecordingServer {
    fn send_unicast(
        &self,
        client: ClientId,
        component: ComponentType,
        message_type: u16,
        buffer: &TypedBuffer,
    ) {
        self.sent.lock().push(SentFrame {
            client,
            component,
            message_type,
            payload: TypedBuffer::from_bytes(buffer.as_bytes().to_vec()),
        });
    }

    fn component(&self, component: ComponentType) -> Option<Arc<dyn Component>> {
        self.components.read().get(&component).cloned()
    }
}
