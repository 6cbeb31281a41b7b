//! # Parley
//!
//! A multi-user chat server built from pluggable components.
//!
//! Each component owns one namespace of message types. The server core
//! accepts WebSocket connections, routes every frame to the component it
//! is addressed to, and tells every component when clients come and go.
//! Two components ship with the server:
//!
//! - [`UserComponent`]: guest names, `Identify`, and the `ChatUser` registry
//! - [`ChannelComponent`]: named channels, join/leave, roster broadcasts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn run() -> Result<(), ParleyError> {
//! let server = ParleyServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::ParleyError;
pub use server::{ParleyServer, ParleyServerBuilder};

pub use parley_channel::{ChannelComponent, ChannelConfig, ChannelInfo, ChannelObserver};
pub use parley_component::{Component, HandleError, RemoteClient, ServerContext, downcast_component};
pub use parley_protocol::{
    ChannelMessageType, ChannelResult, ComponentType, Frame, TypedBuffer, UserMessageType,
    UserResult,
};
pub use parley_transport::ClientId;
pub use parley_user::{Authenticator, ChatUser, OpenAuthenticator, UserComponent, UserConfig, UserError};

/// Everything needed to run a server or write a component.
pub mod prelude {
    pub use crate::{
        Authenticator, ChannelComponent, ChannelConfig, ChannelMessageType, ChannelObserver,
        ChannelResult, ChatUser, ClientId, Component, ComponentType, Frame, HandleError,
        OpenAuthenticator, ParleyError, ParleyServer, RemoteClient, ServerConfig, ServerContext,
        TypedBuffer, UserComponent, UserConfig, UserError, UserMessageType, UserResult,
        downcast_component,
    };
    pub use parley_component::async_trait;
}
