//! `ParleyServer` builder and server loop.
//!
//! This is the entry point for running a Parley chat server. It ties
//! together all the layers: transport → protocol → components.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::RwLock;
use parley_channel::ChannelComponent;
use parley_component::{Component, ComponentError, ServerContext};
use parley_protocol::{ComponentType, TypedBuffer, encode_frame};
use parley_transport::{ClientId, Transport, WebSocketTransport};
use parley_user::{OpenAuthenticator, UserComponent};
use tokio::sync::{Notify, mpsc};
use tokio::sync::mpsc::error::TrySendError;

use crate::handler::handle_connection;
use crate::{ParleyError, ServerConfig};

/// The server's end of one client's bounded outbound queue.
struct ClientHandle {
    sender: mpsc::Sender<Bytes>,
    /// Signalled when a frame does not fit; the handler then disconnects.
    overflow: Arc<Notify>,
}

/// The handler's end of a client's outbound queue.
pub(crate) struct ClientQueue {
    pub(crate) frames: mpsc::Receiver<Bytes>,
    pub(crate) overflow: Arc<Notify>,
}

/// Shared server state passed to each connection handler task.
///
/// This is also the [`ServerContext`] components see.
pub(crate) struct ServerState {
    /// In registration order; lifecycle hooks run in this order.
    components: Vec<Arc<dyn Component>>,
    by_type: HashMap<ComponentType, Arc<dyn Component>>,
    clients: RwLock<HashMap<ClientId, ClientHandle>>,
    pub(crate) config: ServerConfig,
}

impl ServerState {
    fn new(components: Vec<Arc<dyn Component>>, config: ServerConfig) -> Result<Self, ComponentError> {
        let mut by_type = HashMap::new();
        for component in &components {
            let ty = component.component_type();
            if by_type.insert(ty, Arc::clone(component)).is_some() {
                return Err(ComponentError::DuplicateComponent(ty));
            }
        }
        Ok(Self {
            components,
            by_type,
            clients: RwLock::new(HashMap::new()),
            config,
        })
    }

    pub(crate) fn components(&self) -> &[Arc<dyn Component>] {
        &self.components
    }

    pub(crate) fn register_client(&self, client_id: ClientId) -> ClientQueue {
        let (sender, frames) = mpsc::channel(self.config.outbound_queue_len());
        let overflow = Arc::new(Notify::new());
        self.clients.write().insert(
            client_id,
            ClientHandle {
                sender,
                overflow: Arc::clone(&overflow),
            },
        );
        ClientQueue { frames, overflow }
    }

    pub(crate) fn unregister_client(&self, client_id: ClientId) {
        self.clients.write().remove(&client_id);
    }

    fn client_count(&self) -> usize {
        self.clients.read().len()
    }
}

impl ServerContext for ServerState {
    fn send_unicast(
        &self,
        client: ClientId,
        component: ComponentType,
        message_type: u16,
        buffer: &TypedBuffer,
    ) {
        let frame = encode_frame(component, message_type, buffer);
        let clients = self.clients.read();
        let Some(handle) = clients.get(&client) else {
            tracing::trace!(client_id = %client, "dropping frame for unknown client");
            return;
        };
        match handle.sender.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!(client_id = %client, "outbound queue full, dropping frame");
                handle.overflow.notify_one();
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!(client_id = %client, "dropping frame for closing client");
            }
        }
    }

    fn component(&self, component: ComponentType) -> Option<Arc<dyn Component>> {
        self.by_type.get(&component).cloned()
    }
}

/// Builder for configuring and starting a Parley server.
///
/// Components not supplied explicitly are filled in with the standard
/// ones: a [`UserComponent`] that accepts any credentials and a
/// [`ChannelComponent`], both configured from [`ServerConfig`].
///
/// # Example
///
/// ```rust,no_run
/// # async fn run() -> Result<(), parley::ParleyError> {
/// use parley::prelude::*;
///
/// let server = ParleyServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ParleyServerBuilder {
    config: ServerConfig,
    components: Vec<Arc<dyn Component>>,
}

impl ParleyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            components: Vec::new(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Registers a component.
    pub fn component(mut self, component: Arc<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    /// Initializes the components and binds the listener.
    pub async fn build(self) -> Result<ParleyServer, ParleyError> {
        let Self {
            config,
            mut components,
        } = self;

        let has = |components: &[Arc<dyn Component>], ty: ComponentType| {
            components.iter().any(|c| c.component_type() == ty)
        };
        if !has(&components, ComponentType::User) {
            components.insert(
                0,
                Arc::new(UserComponent::new(config.user.clone(), OpenAuthenticator)),
            );
        }
        if !has(&components, ComponentType::Channel) {
            components.push(Arc::new(ChannelComponent::new(config.channel.clone())));
        }

        let state = Arc::new(ServerState::new(components, config)?);
        let context: Arc<dyn ServerContext> = Arc::clone(&state) as Arc<dyn ServerContext>;
        let context: Weak<dyn ServerContext> = Arc::downgrade(&context);
        for component in state.components() {
            component.initialize(Weak::clone(&context))?;
            tracing::debug!(component = %component.component_type(), "component initialized");
        }

        let transport = WebSocketTransport::bind(&state.config.bind).await?;

        for component in state.components() {
            component.on_start();
        }

        Ok(ParleyServer { transport, state })
    }
}

impl Default for ParleyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Parley server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ParleyServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl ParleyServer {
    /// Creates a new builder.
    pub fn builder() -> ParleyServerBuilder {
        ParleyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Looks up a registered component.
    pub fn component(&self, component: ComponentType) -> Option<Arc<dyn Component>> {
        self.state.component(component)
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.state.client_count()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ParleyError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops and
    /// shuts down every component.
    ///
    /// Connections already accepted keep their handler tasks; once the
    /// components are shut down their next message is refused.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ParleyError> {
        tracing::info!(addr = ?self.local_addr().ok(), "parley server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("parley server stopping");
        for component in self.state.components() {
            component.on_stop();
        }
        for component in self.state.components() {
            component.shutdown();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn state_with_queue(len: usize) -> ServerState {
        let config = ServerConfig {
            outbound_queue_len: len,
            ..ServerConfig::default()
        };
        ServerState::new(Vec::new(), config).unwrap()
    }

    fn send_number(state: &ServerState, client: ClientId, n: u32) {
        let mut buffer = TypedBuffer::new();
        buffer.write_u32(n);
        state.send_unicast(client, ComponentType::Channel, 1, &buffer);
    }

    #[tokio::test]
    async fn test_full_queue_drops_frame_and_signals_overflow() {
        let state = state_with_queue(2);
        let client = ClientId::new(1);
        let mut queue = state.register_client(client);

        send_number(&state, client, 1);
        send_number(&state, client, 2);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), queue.overflow.notified())
                .await
                .is_err(),
            "queue within capacity must not signal"
        );

        send_number(&state, client, 3);
        tokio::time::timeout(Duration::from_secs(1), queue.overflow.notified())
            .await
            .expect("overflow should be signalled");

        assert!(queue.frames.try_recv().is_ok());
        assert!(queue.frames.try_recv().is_ok());
        assert!(queue.frames.try_recv().is_err(), "third frame is dropped");
    }

    #[tokio::test]
    async fn test_draining_queue_makes_room_again() {
        let state = state_with_queue(1);
        let client = ClientId::new(1);
        let mut queue = state.register_client(client);

        send_number(&state, client, 1);
        assert!(queue.frames.recv().await.is_some());
        send_number(&state, client, 2);
        assert!(queue.frames.recv().await.is_some());
        assert!(
            tokio::time::timeout(Duration::from_millis(50), queue.overflow.notified())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_send_to_unregistered_client_is_dropped() {
        let state = state_with_queue(4);
        let client = ClientId::new(1);
        let mut queue = state.register_client(client);
        assert_eq!(state.client_count(), 1);

        state.unregister_client(client);
        assert_eq!(state.client_count(), 0);
        send_number(&state, client, 1);
        send_number(&state, ClientId::new(2), 1);

        // The sender went with the registration, so the queue is closed.
        assert!(queue.frames.recv().await.is_none());
    }
}
