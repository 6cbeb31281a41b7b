//! Error types for the user layer.

/// Errors raised by user identification.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    /// The [`Authenticator`](crate::Authenticator) rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),
}
