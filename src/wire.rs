//! The fixed six-byte header that precedes every message or fragment.
//!
//! Layout: `[type][channel][length: u32, network order]`. The high bit of the
//! type byte marks a fragment; fragments carry a sub-header right after the
//! six bytes (see [`crate::fragment`]).

use thiserror::Error;

use crate::byte_order::{read_network_u32, write_network_u32};

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 6;

/// Bit set in the type byte of every fragment.
pub const FRAGMENT_FLAG: u8 = 0x80;

/// Kinds of message carried on the wire, with their type codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Binary = 1,
    Object = 2,
    String = 3,
    System = 4,
    Session = 5,
    Tuple1D = 6,
    Tuple2D = 7,
    Tuple3D = 8,
}

impl MessageType {
    /// Type code written on the wire.
    #[must_use]
    pub const fn code(self) -> u8 { self as u8 }
}

impl TryFrom<u8> for MessageType {
    type Error = HeaderError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            1 => Self::Binary,
            2 => Self::Object,
            3 => Self::String,
            4 => Self::System,
            5 => Self::Session,
            6 => Self::Tuple1D,
            7 => Self::Tuple2D,
            8 => Self::Tuple3D,
            other => return Err(HeaderError::UnknownType(other)),
        })
    }
}

/// Header decoding failures.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeaderError {
    /// The type code is not a known [`MessageType`].
    #[error("unknown message type code {0}")]
    UnknownType(u8),
    /// The body length does not fit in the 32-bit length field.
    #[error("body of {0} bytes exceeds the header length field")]
    LengthOverflow(usize),
}

/// Decoded form of the six-byte header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireHeader {
    type_byte: u8,
    channel: u8,
    length: u32,
}

impl WireHeader {
    /// Header for a whole (unfragmented) message.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::LengthOverflow`] if `length` exceeds `u32::MAX`.
    pub fn whole(kind: MessageType, channel: u8, length: usize) -> Result<Self, HeaderError> {
        Self::build(kind.code(), channel, length)
    }

    /// Header for one fragment; `length` counts the fragment sub-header too.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::LengthOverflow`] if `length` exceeds `u32::MAX`.
    pub fn fragment(kind: MessageType, channel: u8, length: usize) -> Result<Self, HeaderError> {
        Self::build(kind.code() | FRAGMENT_FLAG, channel, length)
    }

    fn build(type_byte: u8, channel: u8, length: usize) -> Result<Self, HeaderError> {
        let length = u32::try_from(length).map_err(|_| HeaderError::LengthOverflow(length))?;
        Ok(Self {
            type_byte,
            channel,
            length,
        })
    }

    /// Parse the on-wire bytes. Unknown type codes are accepted here and
    /// reported by [`message_type`](Self::message_type).
    #[must_use]
    pub fn decode(bytes: [u8; HEADER_SIZE]) -> Self {
        let [type_byte, channel, l0, l1, l2, l3] = bytes;
        Self {
            type_byte,
            channel,
            length: read_network_u32([l0, l1, l2, l3]),
        }
    }

    /// The on-wire bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let [l0, l1, l2, l3] = write_network_u32(self.length);
        [self.type_byte, self.channel, l0, l1, l2, l3]
    }

    /// Whether the fragment flag is set.
    #[must_use]
    pub const fn is_fragment(&self) -> bool { self.type_byte & FRAGMENT_FLAG != 0 }

    /// The message type with the fragment flag removed.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::UnknownType`] for codes outside [`MessageType`].
    pub fn message_type(&self) -> Result<MessageType, HeaderError> {
        MessageType::try_from(self.type_byte & !FRAGMENT_FLAG)
    }

    /// Channel id, or the subtype for system messages.
    #[must_use]
    pub const fn channel(&self) -> u8 { self.channel }

    /// Number of bytes following the header.
    #[must_use]
    pub fn body_len(&self) -> usize { usize::try_from(self.length).unwrap_or(usize::MAX) }
}
