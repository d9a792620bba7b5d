//! Errors raised while marshalling and unmarshalling messages.

use std::string::FromUtf8Error;

use thiserror::Error;

use crate::{
    byte_order::LengthError,
    message::MessageError,
    packet::PacketError,
    wire::{HeaderError, MessageType},
};

/// Codec failure for a single message; other messages are unaffected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MarshallingError {
    /// A packet operation failed.
    #[error(transparent)]
    Packet(#[from] PacketError),
    /// The wire header was invalid.
    #[error(transparent)]
    Header(#[from] HeaderError),
    /// The message contents could not be converted.
    #[error(transparent)]
    Message(#[from] MessageError),
    /// A fragment count or index did not fit the adaptive length encoding.
    #[error("fragment numbering: {0}")]
    Length(#[from] LengthError),
    /// A string message was not valid UTF-8.
    #[error("string message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),
    /// The body length does not suit the message type.
    #[error("{kind:?} body of {len} bytes is malformed")]
    MalformedBody { kind: MessageType, len: usize },
    /// The packet ended inside a header or body.
    #[error("packet truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    /// The transport's packet limit cannot hold a fragment header plus data.
    #[error("packet limit of {0} bytes is too small to carry fragments")]
    PacketSizeTooSmall(usize),
}
