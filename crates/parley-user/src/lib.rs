//! User registry for Parley.
//!
//! This crate owns the `User` component namespace and answers one
//! question for the rest of the server: *who is this client?*
//!
//! 1. **Registration**: every connecting client gets a [`ChatUser`] with a
//!    random guest name and its peer address as hostname.
//! 2. **Identification**: the client claims a username through the
//!    `Identify` message; an [`Authenticator`] checks the credentials.
//! 3. **Lookup**: sibling components resolve a client with
//!    [`UserComponent::chat_user`] (`GetChatUser`).
//!
//! # How it fits in the stack
//!
//! ```text
//! Channel component (above)  ← asks "is this client identified?"
//!     ↕
//! User component (this crate)  ← client identity and auth state
//!     ↕
//! Component contract (below)
//! ```

mod auth;
mod component;
mod error;
mod registry;
mod user;

pub use auth::{Authenticator, OpenAuthenticator};
pub use component::UserComponent;
pub use error::UserError;
pub use registry::UserRegistry;
pub use user::{ChatUser, UserConfig};
