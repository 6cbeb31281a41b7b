//! Error types for the component layer.

use parley_protocol::{ComponentType, ProtocolError};
use parley_transport::ClientId;

/// Errors raised while wiring components into a server.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// A component refused to initialize.
    #[error("component {0} failed to initialize: {1}")]
    InitializationFailed(ComponentType, String),

    /// Two components claimed the same namespace.
    #[error("component {0} is already registered")]
    DuplicateComponent(ComponentType),
}

/// A protocol-level failure while handling one message.
///
/// Business-rule rejections (not identified, bad channel name, ...) are
/// *not* errors: they are answered with a result code and `handle`
/// returns `Ok(())`. An `Err` means the peer or the server is in a state
/// the protocol cannot recover from, and the server core disconnects the
/// client.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// The message type is not one this component accepts from clients.
    #[error("component {0} does not accept message type {1}")]
    UnknownMessageType(ComponentType, u16),

    /// The payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] ProtocolError),

    /// A sibling component the handler depends on is not registered.
    #[error("component {0} is unavailable")]
    ComponentUnavailable(ComponentType),

    /// The user registry has no record of this client.
    #[error("no user record for {0}")]
    UnknownUser(ClientId),

    /// `handle` was called before `initialize` or after `shutdown`.
    #[error("component is not bound to a server")]
    NotInitialized,
}
