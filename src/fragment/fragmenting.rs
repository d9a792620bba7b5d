//! Marshalling that hides transport packet limits from callers.
//!
//! [`FragmentingCodec`] wraps an inner [`MessageCodec`]. Outbound bodies that
//! fit the transport go out whole behind a six-byte header; larger bodies are
//! split into numbered fragments. Inbound packets are cut into header-framed
//! units, fragments are handed to the transport's [`Sequences`], and complete
//! bodies are decoded by the inner codec.

use dashmap::DashMap;
use log::{debug, trace, warn};

use super::{
    FragmentSubHeader,
    FragmentationConfig,
    MAX_FRAGMENT_OVERHEAD,
    MAX_SUB_HEADER_SIZE,
    SequenceNumber,
    Sequences,
};
use crate::{
    byte_order::{LengthError, encoded_length_size},
    codec::{LightweightCodec, MarshalledResult, MarshallingError, MessageCodec},
    message::Message,
    packet::{Packet, SegmentPool},
    qos::{Ordering, Reliability},
    transport::{Transport, TransportId},
    wire::{HEADER_SIZE, MessageType, WireHeader},
};

/// Fragmentation layer around an inner codec.
///
/// Sequence numbers and reassembly state are kept per transport and can be
/// dropped with [`clear_transport`](Self::clear_transport).
///
/// # Examples
///
/// ```
/// use groupwire::{
///     fragment::FragmentingCodec,
///     message::{ChannelId, Message},
///     packet::SegmentPool,
/// };
///
/// let codec = FragmentingCodec::new(SegmentPool::default());
/// let message = Message::string(ChannelId::new(1), "hello");
/// let body_len = codec.encoded_body_len(&message).expect("encodes");
/// assert_eq!(body_len, 5);
/// ```
#[derive(Debug)]
pub struct FragmentingCodec<C = LightweightCodec> {
    inner: C,
    pool: SegmentPool,
    config: FragmentationConfig,
    next_seq: DashMap<TransportId, SequenceNumber>,
    sequences: DashMap<TransportId, Sequences>,
}

impl FragmentingCodec<LightweightCodec> {
    /// Fragment [`LightweightCodec`] bodies with the default window.
    #[must_use]
    pub fn new(pool: SegmentPool) -> Self {
        Self::with_codec(LightweightCodec, pool, FragmentationConfig::default())
    }
}

impl<C: MessageCodec> FragmentingCodec<C> {
    /// Wrap `inner`, drawing packets from `pool`.
    #[must_use]
    pub fn with_codec(inner: C, pool: SegmentPool, config: FragmentationConfig) -> Self {
        Self {
            inner,
            pool,
            config,
            next_seq: DashMap::new(),
            sequences: DashMap::new(),
        }
    }

    /// Pool new packets are drawn from.
    #[must_use]
    pub fn pool(&self) -> &SegmentPool { &self.pool }

    #[must_use]
    pub fn config(&self) -> &FragmentationConfig { &self.config }

    /// Total body bytes the inner codec produces for `message`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshallingError`] if the inner codec fails.
    pub fn encoded_body_len(&self, message: &Message) -> Result<usize, MarshallingError> {
        let mut total = 0;
        for body in self.inner.encode(message, &self.pool)? {
            total += body.len()?;
        }
        Ok(total)
    }

    /// Marshal `message` for `transport`.
    ///
    /// Every returned packet is at most the transport's maximum packet size.
    ///
    /// # Errors
    ///
    /// Returns [`MarshallingError::PacketSizeTooSmall`] if the transport
    /// cannot carry a fragment header plus one byte, a
    /// [`MarshallingError::Length`] error if the fragment count does not fit
    /// the adaptive encoding, or any error from the inner codec.
    pub fn encode(
        &self,
        message: &Message,
        transport: &dyn Transport,
    ) -> Result<MarshalledResult, MarshallingError> {
        let kind = message.message_type();
        let channel = message.channel().get();
        let max = transport.max_packet_size();
        let mut result = MarshalledResult::new();
        for mut body in self.inner.encode(message, &self.pool)? {
            let len = body.len()?;
            if HEADER_SIZE + len <= max {
                let header = WireHeader::whole(kind, channel, len)?;
                body.prepend(&header.encode())?;
                result.push(body);
            } else {
                self.fragment_into(&mut result, body, kind, channel, transport)?;
            }
        }
        Ok(result)
    }

    fn fragment_into(
        &self,
        result: &mut MarshalledResult,
        mut body: Packet,
        kind: MessageType,
        channel: u8,
        transport: &dyn Transport,
    ) -> Result<(), MarshallingError> {
        let max = transport.max_packet_size();
        if max <= MAX_FRAGMENT_OVERHEAD {
            return Err(MarshallingError::PacketSizeTooSmall(max));
        }
        let chunk = max - MAX_FRAGMENT_OVERHEAD;
        let len = body.len()?;
        let fragments = len.div_ceil(chunk);
        let count = u64::try_from(fragments).unwrap_or(u64::MAX);
        encoded_length_size(count)?;
        let count = u32::try_from(count).map_err(|_| LengthError::TooLarge(count))?;

        let seq = self.allocate_seq(transport.id());
        trace!(
            "fragmenting {len} byte {kind:?} body into {count} fragments (seq {seq}, transport {})",
            transport.id()
        );
        for index in 0..count {
            let remaining = body.len()?;
            let mut fragment = if remaining > chunk {
                body.split_out(chunk)?
            } else {
                std::mem::replace(&mut body, Packet::new(&self.pool))
            };
            let sub_header = if index == 0 {
                FragmentSubHeader::First { seq, count }
            } else {
                FragmentSubHeader::Continuation { seq, index }
            };
            let mut prefix = Vec::with_capacity(HEADER_SIZE + MAX_SUB_HEADER_SIZE);
            let sub_len = sub_header.encoded_len()?;
            let header = WireHeader::fragment(kind, channel, sub_len + fragment.len()?)?;
            prefix.extend_from_slice(&header.encode());
            sub_header.encode(&mut prefix)?;
            fragment.prepend(&prefix)?;
            result.push(fragment);
        }
        crate::metrics::inc_fragments(fragments);
        Ok(())
    }

    fn allocate_seq(&self, transport: TransportId) -> SequenceNumber {
        let mut next = self.next_seq.entry(transport).or_default();
        let seq = *next;
        *next = seq.next();
        seq
    }

    /// Unmarshal every unit in `packet`, received on `transport`, passing
    /// each complete message to `deliver` in wire order.
    ///
    /// Units that fail to decode, and fragments that contradict their set,
    /// are logged and skipped. Lost or stale fragments are dropped quietly.
    ///
    /// # Errors
    ///
    /// Returns [`MarshallingError::Truncated`] if a header or body runs past
    /// the end of the packet; units before it have already been delivered.
    pub fn decode(
        &self,
        mut packet: Packet,
        transport: &dyn Transport,
        mut deliver: impl FnMut(Message),
    ) -> Result<(), MarshallingError> {
        while !packet.is_empty()? {
            let available = packet.len()?;
            if available < HEADER_SIZE {
                return Err(MarshallingError::Truncated {
                    needed: HEADER_SIZE,
                    available,
                });
            }
            let mut header_bytes = [0u8; HEADER_SIZE];
            packet.read_into(0, &mut header_bytes)?;
            let header = WireHeader::decode(header_bytes);
            let needed = HEADER_SIZE.saturating_add(header.body_len());
            if available < needed {
                return Err(MarshallingError::Truncated { needed, available });
            }
            drop(packet.split_out(HEADER_SIZE)?);
            let body = packet.split_out(header.body_len())?;

            match self.decode_unit(header, body, transport) {
                Ok(Some(message)) => deliver(message),
                Ok(None) => {}
                Err(err) => warn!(
                    "dropping unit from transport {}: {err}",
                    transport.id()
                ),
            }
        }
        Ok(())
    }

    fn decode_unit(
        &self,
        header: WireHeader,
        mut body: Packet,
        transport: &dyn Transport,
    ) -> Result<Option<Message>, MarshallingError> {
        let kind = header.message_type()?;
        if !header.is_fragment() {
            return self.inner.decode(kind, header.channel(), body);
        }

        let mut sub_bytes = [0u8; MAX_SUB_HEADER_SIZE];
        let sub_len = body.len()?.min(MAX_SUB_HEADER_SIZE);
        body.read_into(0, &mut sub_bytes[..sub_len])?;
        let (sub_header, used) = FragmentSubHeader::decode(&sub_bytes[..sub_len])?;
        drop(body.split_out(used)?);

        let reassembled = {
            let mut sequences = self
                .sequences
                .entry(transport.id())
                .or_insert_with(|| self.sequences_for(transport));
            match sequences.receive(sub_header, kind, header.channel(), body) {
                Ok(reassembled) => reassembled,
                Err(err) => {
                    warn!("transport {}: {err}", transport.id());
                    return Ok(None);
                }
            }
        };
        match reassembled {
            Some(done) => {
                debug!(
                    "reassembled {:?} message on channel {} from transport {}",
                    done.kind,
                    done.channel,
                    transport.id()
                );
                self.inner.decode(done.kind, done.channel, done.body)
            }
            None => Ok(None),
        }
    }

    fn sequences_for(&self, transport: &dyn Transport) -> Sequences {
        if transport.reliability() == Reliability::Reliable && transport.ordering() == Ordering::Ordered {
            Sequences::lossless()
        } else {
            Sequences::windowed(self.config.window_size())
        }
    }

    /// Number of partial messages held for `transport`.
    #[must_use]
    pub fn pending_reassemblies(&self, transport: TransportId) -> usize {
        self.sequences
            .get(&transport)
            .map_or(0, |sequences| sequences.pending())
    }

    /// Forget sequence numbers and drop partial messages for `transport`.
    pub fn clear_transport(&self, transport: TransportId) {
        self.next_seq.remove(&transport);
        if let Some((_, mut sequences)) = self.sequences.remove(&transport) {
            let dropped = sequences.pending();
            sequences.clear();
            if dropped > 0 {
                debug!("transport {transport} removed with {dropped} partial messages");
            }
        }
    }

    /// Drop all per-transport state.
    pub fn clear(&self) {
        self.next_seq.clear();
        self.sequences.clear();
    }
}
