//! Wire protocol for Parley.
//!
//! This crate defines what travels between a client and the server:
//!
//! - **[`TypedBuffer`]**: the payload codec. Every value is written with a
//!   one-byte type tag so a reader can tell a short payload from a
//!   mistyped one.
//! - **[`Frame`]**: the envelope. One transport message carries exactly one
//!   frame: `component type (u16) | message type (u16) | payload`.
//! - **Vocabularies**: [`ComponentType`] plus the message-type and
//!   result-code enums each component owns.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Frame) → Component (handle)
//! ```
//!
//! The protocol layer knows nothing about users or channels beyond the
//! numeric codes that name them.

mod buffer;
mod error;
mod frame;
mod types;

pub use buffer::{MAX_STRING_LEN, TypedBuffer, ValueTag};
pub use error::ProtocolError;
pub use frame::{FRAME_HEADER_LEN, Frame, encode as encode_frame};
pub use types::{ChannelMessageType, ChannelResult, ComponentType, UserMessageType, UserResult};
