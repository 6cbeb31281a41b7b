//! Services the server core offers to its components.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use parley_protocol::{ComponentType, TypedBuffer};
use parley_transport::ClientId;

use crate::{Component, ComponentError, HandleError};

/// What a component may ask of the server that owns it.
pub trait ServerContext: Send + Sync {
    /// Allocates an empty outbound payload (`CreateBuffer`).
    fn create_buffer(&self) -> TypedBuffer {
        TypedBuffer::new()
    }

    /// Queues one message for one client (`SendUnicast`).
    ///
    /// Fire-and-forget: delivery failure, including an already
    /// disconnected client, is the transport's concern and is not
    /// reported back.
    fn send_unicast(
        &self,
        client: ClientId,
        component: ComponentType,
        message_type: u16,
        buffer: &TypedBuffer,
    );

    /// Looks up a sibling component (`GetComponent`).
    fn component(&self, component: ComponentType) -> Option<Arc<dyn Component>>;
}

/// A component's slot for its server reference.
///
/// Set by `initialize`, cleared by `shutdown`. Handlers call
/// [`ServerBinding::get`] once per message and hold the upgraded `Arc`
/// for the rest of it.
#[derive(Default)]
pub struct ServerBinding {
    server: RwLock<Option<Weak<dyn ServerContext>>>,
}

impl ServerBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `component` to `server`.
    ///
    /// # Errors
    /// [`ComponentError::InitializationFailed`] if the slot still points at
    /// a live server. A component instance serves one server at a time.
    pub fn bind(
        &self,
        component: ComponentType,
        server: Weak<dyn ServerContext>,
    ) -> Result<(), ComponentError> {
        let mut slot = self.server.write();
        if slot.as_ref().is_some_and(|s| s.strong_count() > 0) {
            return Err(ComponentError::InitializationFailed(
                component,
                "already bound to a running server".to_string(),
            ));
        }
        *slot = Some(server);
        tracing::debug!(%component, "component bound to server");
        Ok(())
    }

    pub fn clear(&self) {
        if self.server.write().take().is_some() {
            tracing::debug!("component unbound from server");
        }
    }

    /// Returns the bound server.
    ///
    /// # Errors
    /// [`HandleError::NotInitialized`] if unbound or the server is gone.
    pub fn get(&self) -> Result<Arc<dyn ServerContext>, HandleError> {
        self.server
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(HandleError::NotInitialized)
    }
}
