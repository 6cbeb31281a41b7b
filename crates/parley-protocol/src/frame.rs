//! `Frame`: the envelope around every payload.
//!
//! ```text
//! ┌──────────────────┬──────────────────┬──────────────────────┐
//! │ component u16 LE │ message   u16 LE │ payload (TypedBuffer)│
//! └──────────────────┴──────────────────┴──────────────────────┘
//! ```
//!
//! The message type stays a raw `u16` here: only the addressed component
//! knows its own namespace.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{ComponentType, ProtocolError, TypedBuffer};

/// Size of the fixed frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// One decoded transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub component: ComponentType,
    pub message_type: u16,
    pub payload: TypedBuffer,
}

impl Frame {
    pub fn new(component: ComponentType, message_type: impl Into<u16>, payload: TypedBuffer) -> Self {
        Self {
            component,
            message_type: message_type.into(),
            payload,
        }
    }

    /// Encodes the frame into one transport message.
    pub fn encode(&self) -> Bytes {
        encode(self.component, self.message_type, &self.payload)
    }

    /// Decodes one transport message.
    ///
    /// # Errors
    /// [`ProtocolError::FrameTooShort`] if the header is incomplete,
    /// [`ProtocolError::UnknownComponent`] for an unregistered component
    /// type.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < FRAME_HEADER_LEN {
            return Err(ProtocolError::FrameTooShort(data.len()));
        }
        let mut header = &data[..FRAME_HEADER_LEN];
        let component = ComponentType::try_from(header.get_u16_le())?;
        let message_type = header.get_u16_le();
        let payload = TypedBuffer::from_bytes(Bytes::copy_from_slice(&data[FRAME_HEADER_LEN..]));
        Ok(Self {
            component,
            message_type,
            payload,
        })
    }
}

/// Encodes a frame without taking ownership of the payload.
///
/// Broadcasts encode the same payload once per recipient; this avoids a
/// clone of the buffer for each.
pub fn encode(component: ComponentType, message_type: u16, payload: &TypedBuffer) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.put_u16_le(component.into());
    out.put_u16_le(message_type);
    out.put_slice(payload.as_bytes());
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelMessageType;

    #[test]
    fn test_header_layout() {
        let frame = Frame::new(
            ComponentType::Channel,
            ChannelMessageType::LeaveChannel,
            TypedBuffer::new(),
        );
        assert_eq!(frame.encode().as_ref(), &[2, 0, 2, 0]);
    }

    #[test]
    fn test_decode_recovers_payload() {
        let mut payload = TypedBuffer::new();
        payload.write_string("#rust");
        let bytes = Frame::new(ComponentType::Channel, ChannelMessageType::JoinChannel, payload)
            .encode();

        let mut frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.component, ComponentType::Channel);
        assert_eq!(frame.message_type, 0);
        assert_eq!(frame.payload.read_string().unwrap(), "#rust");
    }

    #[test]
    fn test_decode_short_frame() {
        assert_eq!(Frame::decode(&[1, 0, 0]), Err(ProtocolError::FrameTooShort(3)));
    }

    #[test]
    fn test_decode_unknown_component() {
        assert_eq!(
            Frame::decode(&[0x34, 0x12, 0, 0]),
            Err(ProtocolError::UnknownComponent(0x1234))
        );
    }
}
