//! Inner message codecs and marshalled output.
//!
//! A [`MessageCodec`] turns a [`Message`] into body packets and back. It never
//! writes the wire header: the
//! [`FragmentingCodec`](crate::fragment::FragmentingCodec) stamps headers and
//! splits bodies that exceed a transport's packet limit.

mod error;
mod lightweight;

use std::collections::VecDeque;

pub use error::MarshallingError;
pub use lightweight::LightweightCodec;

use crate::{
    message::Message,
    packet::{Packet, SegmentPool},
    wire::MessageType,
};

/// Application-level encoder and decoder for message bodies.
pub trait MessageCodec: Send + Sync {
    /// Encode `message` into one or more body packets drawn from `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshallingError`] if the message cannot be encoded.
    fn encode(&self, message: &Message, pool: &SegmentPool) -> Result<Vec<Packet>, MarshallingError>;

    /// Decode one body. `channel` is the header's channel byte. `Ok(None)`
    /// means the codec needs further bodies before it can yield a message.
    ///
    /// # Errors
    ///
    /// Returns [`MarshallingError`] if the body is malformed.
    fn decode(
        &self,
        kind: MessageType,
        channel: u8,
        body: Packet,
    ) -> Result<Option<Message>, MarshallingError>;
}

/// Packets produced by marshalling one message, consumed front to back.
///
/// Dropping the result releases any packets not yet removed.
#[derive(Debug, Default)]
pub struct MarshalledResult {
    packets: VecDeque<Packet>,
}

impl MarshalledResult {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Queue a packet for sending.
    pub fn push(&mut self, packet: Packet) { self.packets.push_back(packet); }

    /// Take the next packet, if any.
    pub fn remove_packet(&mut self) -> Option<Packet> { self.packets.pop_front() }

    #[must_use]
    pub fn has_packets(&self) -> bool { !self.packets.is_empty() }

    /// Whether every packet has been taken.
    #[must_use]
    pub fn is_finished(&self) -> bool { self.packets.is_empty() }

    #[must_use]
    pub fn len(&self) -> usize { self.packets.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.packets.is_empty() }
}

impl FromIterator<Packet> for MarshalledResult {
    fn from_iter<I: IntoIterator<Item = Packet>>(iter: I) -> Self {
        Self {
            packets: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MarshalledResult {
    type Item = Packet;
    type IntoIter = std::collections::vec_deque::IntoIter<Packet>;

    fn into_iter(self) -> Self::IntoIter { self.packets.into_iter() }
}
