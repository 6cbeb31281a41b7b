//! Unified error type for Parley.

use parley_component::{ComponentError, HandleError};
use parley_protocol::ProtocolError;
use parley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame or payload that could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A component failed to register or initialize.
    #[error(transparent)]
    Component(#[from] ComponentError),

    /// A component rejected a message as a protocol violation.
    #[error(transparent)]
    Handle(#[from] HandleError),

    /// The configuration file is not valid TOML for [`ServerConfig`](crate::ServerConfig).
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_protocol::ComponentType;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let parley_err: ParleyError = err.into();
        assert!(matches!(parley_err, ParleyError::Transport(_)));
        assert!(parley_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let parley_err: ParleyError = ProtocolError::FrameTooShort(2).into();
        assert!(matches!(parley_err, ParleyError::Protocol(_)));
    }

    #[test]
    fn test_from_component_errors() {
        let err: ParleyError = ComponentError::DuplicateComponent(ComponentType::User).into();
        assert!(matches!(err, ParleyError::Component(_)));

        let err: ParleyError = HandleError::NotInitialized.into();
        assert!(matches!(err, ParleyError::Handle(_)));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("bind = ").unwrap_err();
        let err: ParleyError = toml_err.into();
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
