//! Per-connection handler: registration, frame routing, and cleanup.
//!
//! Each accepted socket gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the WebSocket handshake, bounded by the handshake timeout
//!   2. Register the client's outbound queue, tell every component
//!   3. Spawn a writer task draining the queue to the socket
//!   4. Loop: receive frames → route to the addressed component
//!   5. On close, timeout, a full outbound queue, or protocol error:
//!      unregister and tell every component, then let the writer flush
//!      and exit

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parley_component::{HandleError, RemoteClient, ServerContext};
use parley_protocol::Frame;
use parley_transport::{
    ClientId, Connection, PendingConnection, PendingWebSocket, WebSocketConnection,
};
use tokio::sync::{Notify, mpsc};

use crate::ParleyError;
use crate::server::{ClientQueue, ServerState};

/// How long a departing client's writer may spend flushing its queue.
const WRITER_FLUSH_LIMIT: Duration = Duration::from_secs(5);

/// Drop guard that disconnects a client when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. The
/// component hooks are synchronous, so they run right here.
struct ClientGuard {
    client: RemoteClient,
    state: Arc<ServerState>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.state.unregister_client(self.client.id);
        for component in self.state.components() {
            component.on_client_disconnected(&self.client);
        }
        tracing::info!(client_id = %self.client.id, "client disconnected");
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    pending: PendingWebSocket,
    state: Arc<ServerState>,
) -> Result<(), ParleyError> {
    let peer = pending.peer_addr();
    let upgraded = match state.config.handshake_timeout() {
        Some(limit) => match tokio::time::timeout(limit, pending.handshake()).await {
            Ok(upgraded) => upgraded,
            Err(_) => {
                tracing::debug!(%peer, "handshake timed out");
                return Ok(());
            }
        },
        None => pending.handshake().await,
    };
    let conn = match upgraded {
        Ok(conn) => Arc::new(conn),
        Err(e) => {
            tracing::debug!(%peer, error = %e, "handshake failed");
            return Ok(());
        }
    };
    let client = RemoteClient::new(conn.id(), conn.peer_addr());

    // Register the queue and create the guard together: every component
    // that hears about the connect also hears about the disconnect.
    let ClientQueue { frames, overflow } = state.register_client(client.id);
    let guard = ClientGuard {
        client,
        state: Arc::clone(&state),
    };
    for component in state.components() {
        component.on_client_connected(&client);
    }
    tracing::info!(client_id = %client.id, peer = %client.endpoint, "client connected");

    let mut writer = tokio::spawn(write_loop(Arc::clone(&conn), frames, client.id));
    let result = read_loop(&conn, &state, &client, &overflow).await;

    // Unregistering drops the queue's only sender, so the writer exits
    // once it has flushed what is already queued. A peer that stopped
    // reading gets its writer aborted instead.
    drop(guard);
    if tokio::time::timeout(WRITER_FLUSH_LIMIT, &mut writer).await.is_err() {
        tracing::debug!(client_id = %client.id, "writer did not flush in time, aborting");
        writer.abort();
    }
    let _ = tokio::time::timeout(WRITER_FLUSH_LIMIT, conn.close()).await;
    result
}

async fn read_loop(
    conn: &WebSocketConnection,
    state: &ServerState,
    client: &RemoteClient,
    overflow: &Notify,
) -> Result<(), ParleyError> {
    let idle = state.config.idle_timeout();

    loop {
        let next = async {
            match idle {
                Some(limit) => tokio::time::timeout(limit, conn.recv()).await.ok(),
                None => Some(conn.recv().await),
            }
        };
        let received = tokio::select! {
            () = overflow.notified() => {
                tracing::warn!(client_id = %client.id, "client too slow to drain its queue, disconnecting");
                return Ok(());
            }
            next = next => match next {
                Some(received) => received,
                None => {
                    tracing::info!(client_id = %client.id, "connection timed out");
                    return Ok(());
                }
            },
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(client_id = %client.id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(client_id = %client.id, error = %e, "recv error");
                return Err(e.into());
            }
        };

        let mut frame = match Frame::decode(&data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(client_id = %client.id, error = %e, "undecodable frame, disconnecting");
                return Err(e.into());
            }
        };

        let Some(component) = state.component(frame.component) else {
            let e = HandleError::ComponentUnavailable(frame.component);
            tracing::warn!(client_id = %client.id, error = %e, "frame for missing component, disconnecting");
            return Err(e.into());
        };

        if let Err(e) = component
            .handle(client, frame.message_type, &mut frame.payload)
            .await
        {
            tracing::warn!(
                client_id = %client.id,
                component = %frame.component,
                message_type = frame.message_type,
                error = %e,
                "protocol error, disconnecting"
            );
            return Err(e.into());
        }
    }
}

async fn write_loop(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::Receiver<Bytes>,
    client_id: ClientId,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(%client_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}
