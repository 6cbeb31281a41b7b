//! Error types for the protocol layer.

use crate::ValueTag;

/// Errors raised while decoding frames and payloads.
///
/// Every variant means the peer sent something this server cannot make
/// sense of. The server core treats them as protocol errors and drops
/// the offending client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The payload ended before the value being read was complete.
    #[error("unexpected end of buffer")]
    UnexpectedEnd,

    /// The next value in the payload carries a different type tag.
    #[error("type mismatch: expected {expected}, found tag {found}")]
    TypeMismatch { expected: ValueTag, found: u8 },

    /// A string value was not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// A string length prefix exceeds [`MAX_STRING_LEN`](crate::MAX_STRING_LEN).
    #[error("string of {0} bytes exceeds the limit")]
    StringTooLong(usize),

    /// The frame is shorter than its fixed header.
    #[error("frame of {0} bytes is shorter than the header")]
    FrameTooShort(usize),

    /// The frame names a component type this server does not know.
    #[error("unknown component type {0}")]
    UnknownComponent(u16),

    /// The message type is outside the component's namespace.
    #[error("unknown message type {0}")]
    UnknownMessageType(u16),

    /// A result code outside the known vocabulary.
    #[error("unknown result code {0}")]
    UnknownResult(u16),
}
