//! The `Component` trait: the extension point every message handler
//! implements.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parley_protocol::{ComponentType, TypedBuffer};
use parley_transport::ClientId;

use crate::{ComponentError, HandleError, ServerContext};

/// A connected client as components see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteClient {
    pub id: ClientId,
    pub endpoint: SocketAddr,
}

impl RemoteClient {
    pub fn new(id: ClientId, endpoint: SocketAddr) -> Self {
        Self { id, endpoint }
    }
}

/// A pluggable handler owning one message-type namespace.
///
/// The server core calls these methods; components never call each
/// other's hooks directly. Lifecycle order:
///
/// ```text
/// initialize → on_start → (connect / handle / disconnect)* → on_stop → shutdown
/// ```
///
/// Every hook except `handle` is synchronous and must not block: they run
/// on connection tasks, and `on_client_disconnected` also runs from a
/// drop guard.
#[async_trait]
pub trait Component: Any + Send + Sync {
    /// The namespace this component handles (`GetType`).
    fn component_type(&self) -> ComponentType;

    /// Binds the component to its server. Called once, before any other
    /// hook. The reference is weak because the server owns its
    /// components.
    fn initialize(&self, server: Weak<dyn ServerContext>) -> Result<(), ComponentError>;

    /// Releases all state and the server reference. Idempotent.
    fn shutdown(&self) {}

    fn on_start(&self) {}

    /// Clears runtime state when the server stops. Idempotent.
    fn on_stop(&self) {}

    fn on_client_connected(&self, _client: &RemoteClient) {}

    fn on_client_disconnected(&self, _client: &RemoteClient) {}

    /// Handles one message addressed to this component.
    ///
    /// `Ok(())` means the message was recognized and processed, including
    /// when processing ended in a rejection reply. `Err` is a protocol
    /// error; the caller disconnects the client.
    async fn handle(
        &self,
        client: &RemoteClient,
        message_type: u16,
        buffer: &mut TypedBuffer,
    ) -> Result<(), HandleError>;

    /// Enables typed access to a sibling via [`downcast_component`].
    fn as_any(&self) -> &dyn Any;
}

/// Views a type-erased component as its concrete type.
///
/// ```ignore
/// let users = server.component(ComponentType::User)?;
/// let users = downcast_component::<UserComponent>(&users)?;
/// ```
pub fn downcast_component<T: Component>(component: &Arc<dyn Component>) -> Option<&T> {
    component.as_any().downcast_ref::<T>()
}
