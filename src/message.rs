//! Application-level messages moved by the pipeline.
//!
//! A [`Message`] pairs a [`ChannelId`] with a [`Payload`]. System messages
//! carry their [`SystemMessageKind`] where other messages carry a channel,
//! and are treated as control traffic belonging to every channel.

use bincode::{
    Decode,
    Encode,
    config,
    decode_from_slice,
    encode_to_vec,
    error::{DecodeError, EncodeError},
};
use bytes::Bytes;
use derive_more::{Display, From, Into};
use thiserror::Error;

use crate::wire::MessageType;

/// Application-defined logical stream identifier.
///
/// # Examples
///
/// ```
/// use groupwire::message::ChannelId;
/// let id = ChannelId::new(5);
/// assert_eq!(id.get(), 5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
#[display("{_0}")]
pub struct ChannelId(u8);

impl ChannelId {
    /// Create a new identifier.
    #[must_use]
    pub const fn new(value: u8) -> Self { Self(value) }

    /// Return the raw identifier.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }
}

/// Subtypes of system (control) messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SystemMessageKind {
    IdentityRequest = 1,
    IdentityResponse = 2,
    Acknowledged = 3,
    PingRequest = 4,
    PingResponse = 5,
    ConnexionClosing = 6,
    IncompatibleVersion = 8,
}

impl SystemMessageKind {
    /// Code carried in the header's channel byte.
    #[must_use]
    pub const fn code(self) -> u8 { self as u8 }
}

impl TryFrom<u8> for SystemMessageKind {
    type Error = MessageError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            1 => Self::IdentityRequest,
            2 => Self::IdentityResponse,
            3 => Self::Acknowledged,
            4 => Self::PingRequest,
            5 => Self::PingResponse,
            6 => Self::ConnexionClosing,
            8 => Self::IncompatibleVersion,
            other => return Err(MessageError::UnknownSystemKind(other)),
        })
    }
}

/// Membership changes announced by session messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionAction {
    Joined = 1,
    Lives = 2,
    Inactive = 3,
    Left = 4,
}

impl SessionAction {
    /// Code written on the wire.
    #[must_use]
    pub const fn code(self) -> u8 { self as u8 }
}

impl TryFrom<u8> for SessionAction {
    type Error = MessageError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            1 => Self::Joined,
            2 => Self::Lives,
            3 => Self::Inactive,
            4 => Self::Left,
            other => return Err(MessageError::UnknownSessionAction(other)),
        })
    }
}

/// Errors converting message contents.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MessageError {
    /// The system subtype code is not recognised.
    #[error("unknown system message kind {0}")]
    UnknownSystemKind(u8),
    /// The session action code is not recognised.
    #[error("unknown session action {0}")]
    UnknownSessionAction(u8),
    /// The message is not an object message.
    #[error("expected an object message, found {0:?}")]
    NotAnObject(MessageType),
    /// Object serialisation failed.
    #[error("failed to encode object: {0}")]
    Encode(#[from] EncodeError),
    /// Object deserialisation failed.
    #[error("failed to decode object: {0}")]
    Decode(#[from] DecodeError),
}

/// Message contents.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Binary(Bytes),
    /// An application object already serialised with `bincode`.
    Object(Bytes),
    String(String),
    System {
        kind: SystemMessageKind,
        data: Bytes,
    },
    Session {
        client_id: u32,
        action: SessionAction,
    },
    Tuple1D(f64),
    Tuple2D(f64, f64),
    Tuple3D(f64, f64, f64),
}

/// A message addressed to a channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    channel: ChannelId,
    payload: Payload,
}

impl Message {
    /// Wrap an arbitrary payload. System payloads take their channel from
    /// their kind, so `channel` is ignored for them.
    #[must_use]
    pub fn new(channel: ChannelId, payload: Payload) -> Self {
        let channel = match &payload {
            Payload::System { kind, .. } => ChannelId::new(kind.code()),
            _ => channel,
        };
        Self { channel, payload }
    }

    /// A byte-blob message.
    #[must_use]
    pub fn binary(channel: ChannelId, bytes: impl Into<Bytes>) -> Self {
        Self::new(channel, Payload::Binary(bytes.into()))
    }

    /// A text message.
    #[must_use]
    pub fn string(channel: ChannelId, text: impl Into<String>) -> Self {
        Self::new(channel, Payload::String(text.into()))
    }

    /// Serialise `value` with `bincode` into an object message.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Encode`] if serialisation fails.
    pub fn object<T: Encode>(channel: ChannelId, value: &T) -> Result<Self, MessageError> {
        let bytes = encode_to_vec(value, config::standard())?;
        Ok(Self::new(channel, Payload::Object(bytes.into())))
    }

    /// A control message of the given kind.
    #[must_use]
    pub fn system(kind: SystemMessageKind, data: impl Into<Bytes>) -> Self {
        Self::new(
            ChannelId::new(kind.code()),
            Payload::System {
                kind,
                data: data.into(),
            },
        )
    }

    /// A session membership announcement.
    #[must_use]
    pub fn session(channel: ChannelId, client_id: u32, action: SessionAction) -> Self {
        Self::new(channel, Payload::Session { client_id, action })
    }

    /// Channel this message travels on; the subtype code for system messages.
    #[must_use]
    pub const fn channel(&self) -> ChannelId { self.channel }

    /// Message contents.
    #[must_use]
    pub const fn payload(&self) -> &Payload { &self.payload }

    /// Consume the message, returning its contents.
    #[must_use]
    pub fn into_payload(self) -> Payload { self.payload }

    /// Wire type of this message.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self.payload {
            Payload::Binary(_) => MessageType::Binary,
            Payload::Object(_) => MessageType::Object,
            Payload::String(_) => MessageType::String,
            Payload::System { .. } => MessageType::System,
            Payload::Session { .. } => MessageType::Session,
            Payload::Tuple1D(..) => MessageType::Tuple1D,
            Payload::Tuple2D(..) => MessageType::Tuple2D,
            Payload::Tuple3D(..) => MessageType::Tuple3D,
        }
    }

    /// Whether this is control traffic that belongs to every channel.
    #[must_use]
    pub const fn is_control(&self) -> bool { matches!(self.payload, Payload::System { .. }) }

    /// Deserialise the object carried by an object message.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::NotAnObject`] for other message types, or
    /// [`MessageError::Decode`] if the bytes do not decode as `T`.
    pub fn decode_object<T: Decode<()>>(&self) -> Result<T, MessageError> {
        let Payload::Object(bytes) = &self.payload else {
            return Err(MessageError::NotAnObject(self.message_type()));
        };
        let (value, _) = decode_from_slice(bytes, config::standard())?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use bincode::{Decode, Encode};
    use bytes::Bytes;

    use super::{ChannelId, Message, MessageError, SystemMessageKind};
    use crate::wire::MessageType;

    #[derive(Debug, PartialEq, Encode, Decode)]
    struct Cursor {
        x: i32,
        y: i32,
    }

    #[test]
    fn object_messages_round_trip_through_bincode() {
        let msg = Message::object(ChannelId::new(2), &Cursor { x: 3, y: -4 }).expect("encodes");
        assert_eq!(msg.message_type(), MessageType::Object);
        assert_eq!(msg.decode_object::<Cursor>().expect("decodes"), Cursor { x: 3, y: -4 });
    }

    #[test]
    fn decoding_non_objects_is_rejected() {
        let msg = Message::string(ChannelId::new(2), "hi");
        assert!(matches!(
            msg.decode_object::<Cursor>(),
            Err(MessageError::NotAnObject(MessageType::String))
        ));
    }

    #[test]
    fn system_messages_use_kind_as_channel() {
        let msg = Message::system(SystemMessageKind::PingRequest, Bytes::new());
        assert_eq!(msg.channel(), ChannelId::new(4));
        assert!(msg.is_control());
        assert!(!Message::binary(ChannelId::new(4), Bytes::new()).is_control());
    }
}
