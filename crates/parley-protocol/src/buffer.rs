//! `TypedBuffer`: the payload codec shared by every component.
//!
//! A payload is a flat sequence of values. Each value is a one-byte
//! [`ValueTag`] followed by its encoding:
//!
//! ```text
//! u8     : 0x01 | 1 byte
//! u16    : 0x02 | 2 bytes LE
//! u32    : 0x03 | 4 bytes LE
//! u64    : 0x04 | 8 bytes LE
//! bool   : 0x05 | 1 byte (0 or 1)
//! string : 0x06 | u32 LE byte length | UTF-8 bytes
//! ```
//!
//! Writes append at the end; reads consume from a cursor at the front.
//! A failed read leaves the cursor where it was.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ProtocolError;

/// Upper bound on a single string value, in bytes.
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// Type tag written in front of every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueTag {
    U8 = 1,
    U16 = 2,
    U32 = 3,
    U64 = 4,
    Bool = 5,
    String = 6,
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Bool => "bool",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// A growable, typed read/write buffer.
///
/// Outbound payloads come from `ServerContext::create_buffer` and are
/// filled with `write_*`. Inbound payloads are wrapped with
/// [`TypedBuffer::from_bytes`] and drained with `read_*`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TypedBuffer {
    data: BytesMut,
    cursor: usize,
}

impl TypedBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps received payload bytes for reading.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        Self {
            data: BytesMut::from(data.as_ref()),
            cursor: 0,
        }
    }

    /// The full encoded contents, independent of the read cursor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Total encoded length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed by reads.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    // -- writes --

    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(ValueTag::U8 as u8);
        self.data.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.data.put_u8(ValueTag::U16 as u8);
        self.data.put_u16_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.put_u8(ValueTag::U32 as u8);
        self.data.put_u32_le(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.data.put_u8(ValueTag::U64 as u8);
        self.data.put_u64_le(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.data.put_u8(ValueTag::Bool as u8);
        self.data.put_u8(u8::from(value));
    }

    /// Writes a length-prefixed UTF-8 string.
    ///
    /// Strings over [`MAX_STRING_LEN`] are truncated at the last char
    /// boundary that fits; readers would reject them otherwise.
    pub fn write_string(&mut self, value: &str) {
        let mut end = value.len().min(MAX_STRING_LEN);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        let bytes = &value.as_bytes()[..end];
        self.data.put_u8(ValueTag::String as u8);
        self.data.put_u32_le(bytes.len() as u32);
        self.data.put_slice(bytes);
    }

    // -- reads --

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.read_tagged(ValueTag::U8, 1, |b| b.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.read_tagged(ValueTag::U16, 2, |b| b.get_u16_le())
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.read_tagged(ValueTag::U32, 4, |b| b.get_u32_le())
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        self.read_tagged(ValueTag::U64, 8, |b| b.get_u64_le())
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        self.read_tagged(ValueTag::Bool, 1, |b| b.get_u8() != 0)
    }

    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let mut rest = &self.data[self.cursor..];
        expect_tag(&mut rest, ValueTag::String)?;
        if rest.remaining() < 4 {
            return Err(ProtocolError::UnexpectedEnd);
        }
        let len = rest.get_u32_le() as usize;
        if len > MAX_STRING_LEN {
            return Err(ProtocolError::StringTooLong(len));
        }
        if rest.remaining() < len {
            return Err(ProtocolError::UnexpectedEnd);
        }
        let value = std::str::from_utf8(&rest[..len])
            .map_err(|_| ProtocolError::InvalidUtf8)?
            .to_owned();
        self.cursor += 1 + 4 + len;
        Ok(value)
    }

    /// Reads one fixed-width value: checks the tag, then decodes `width`
    /// bytes with `get`. The cursor only moves on success.
    fn read_tagged<T>(
        &mut self,
        tag: ValueTag,
        width: usize,
        get: impl FnOnce(&mut &[u8]) -> T,
    ) -> Result<T, ProtocolError> {
        let mut rest = &self.data[self.cursor..];
        expect_tag(&mut rest, tag)?;
        if rest.remaining() < width {
            return Err(ProtocolError::UnexpectedEnd);
        }
        let value = get(&mut rest);
        self.cursor += 1 + width;
        Ok(value)
    }
}

fn expect_tag(rest: &mut &[u8], expected: ValueTag) -> Result<(), ProtocolError> {
    if !rest.has_remaining() {
        return Err(ProtocolError::UnexpectedEnd);
    }
    let found = rest.get_u8();
    if found != expected as u8 {
        return Err(ProtocolError::TypeMismatch { expected, found });
    }
    Ok(())
}

impl fmt::Debug for TypedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedBuffer")
            .field("len", &self.data.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}
