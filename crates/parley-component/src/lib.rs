//! The component contract for Parley.
//!
//! A server is a set of components, each owning one
//! [`ComponentType`](parley_protocol::ComponentType) namespace. The server
//! core drives their lifecycle, tells them about connects and
//! disconnects, and routes every frame addressed to them into
//! [`Component::handle`]. Components reach back into the server through
//! [`ServerContext`]: allocate a buffer, send a unicast, find a sibling.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server core (parley)        ← owns components, implements ServerContext
//!     ↕
//! Component contract (this crate)
//!     ↕
//! Components (parley-user, parley-channel)
//! ```

mod component;
mod context;
mod error;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use component::{Component, RemoteClient, downcast_component};
pub use context::{ServerBinding, ServerContext};
pub use error::{ComponentError, HandleError};

/// Re-exported so implementors don't need their own `async-trait` import
/// to match the trait's signature.
pub use async_trait::async_trait;
