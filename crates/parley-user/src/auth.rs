//! Authentication hook for identification.
//!
//! Parley doesn't store passwords. Deployments plug their own check in
//! through [`Authenticator`]; the server calls it whenever a client sends
//! `Identify`.

use async_trait::async_trait;

use crate::UserError;

/// Validates the credentials a client presents with `Identify`.
///
/// # Example
///
/// ```rust
/// use parley_user::{Authenticator, UserError};
///
/// /// Only lets in names on a fixed list.
/// struct Allowlist(Vec<String>);
///
/// #[async_trait::async_trait]
/// impl Authenticator for Allowlist {
///     async fn authenticate(&self, username: &str, _password: &str) -> Result<(), UserError> {
///         if self.0.iter().any(|n| n == username) {
///             Ok(())
///         } else {
///             Err(UserError::AuthFailed(format!("{username} is not allowed")))
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Returns `Ok(())` if `username` may identify with `password`.
    ///
    /// Runs without any registry lock held, so it may await I/O.
    async fn authenticate(&self, username: &str, password: &str) -> Result<(), UserError>;
}

/// Accepts any credentials. Identification then only enforces the
/// username rules and uniqueness.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAuthenticator;

#[async_trait]
impl Authenticator for OpenAuthenticator {
    async fn authenticate(&self, _username: &str, _password: &str) -> Result<(), UserError> {
        Ok(())
    }
}
