//! The standard [`Connection`]: ranked transports, fragmentation and a
//! scheduler behind one lock.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use tracing::{debug, info, warn};

use super::{Connection, NoMatchingTransport, PeerConnectionBuilder};
use crate::{
    codec::{LightweightCodec, MarshalledResult, MarshallingError, MessageCodec},
    fragment::{FragmentationConfig, FragmentingCodec},
    message::{ChannelId, Message},
    packet::{Packet, SegmentPool},
    qos::{self, ChannelRequirements, MessageRequirements, TransportRanking, rank_transports},
    scheduler::{CannotSendMessages, PacketScheduler},
    transport::{Transport, TransportError, TransportId},
};

/// Everything needed to exchange messages with one peer.
///
/// Sends and flushes run under a single lock so that concurrent callers
/// never interleave inside a flush; receiving only touches per-transport
/// reassembly state and may run from transport threads at any time.
///
/// A transport that fails during a send is removed, together with its
/// sequence numbers and partial messages.
///
/// # Examples
///
/// ```
/// use groupwire::{
///     connection::PeerConnection,
///     message::{ChannelId, Message},
///     qos::ChannelRequirements,
/// };
///
/// let connection = PeerConnection::builder().build().expect("valid defaults");
/// let result = connection.send(
///     Message::string(ChannelId::new(1), "hello"),
///     None,
///     ChannelRequirements::chat_like(),
/// );
/// // No transport has been added yet.
/// assert!(result.is_err());
/// ```
pub struct PeerConnection<C = LightweightCodec> {
    transports: RwLock<Vec<Arc<dyn Transport>>>,
    ranking: Box<dyn TransportRanking>,
    codec: FragmentingCodec<C>,
    scheduler: Mutex<Box<dyn PacketScheduler>>,
}

impl PeerConnection<LightweightCodec> {
    /// Start building a connection.
    #[must_use]
    pub fn builder() -> PeerConnectionBuilder { PeerConnectionBuilder::new() }
}

impl<C: MessageCodec> PeerConnection<C> {
    pub(crate) fn from_parts(
        codec: C,
        pool: SegmentPool,
        fragmentation: FragmentationConfig,
        ranking: Box<dyn TransportRanking>,
        scheduler: Box<dyn PacketScheduler>,
    ) -> Self {
        Self {
            transports: RwLock::new(Vec::new()),
            ranking,
            codec: FragmentingCodec::with_codec(codec, pool, fragmentation),
            scheduler: Mutex::new(scheduler),
        }
    }

    fn scheduler(&self) -> MutexGuard<'_, Box<dyn PacketScheduler>> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pool packets are drawn from.
    #[must_use]
    pub fn pool(&self) -> &SegmentPool { self.codec.pool() }

    /// Attach `transport`, replacing any transport with the same id.
    pub fn add_transport(&self, transport: Arc<dyn Transport>) {
        let id = transport.id();
        let mut transports = self.transports.write().unwrap_or_else(PoisonError::into_inner);
        transports.retain(|t| t.id() != id);
        transports.push(transport);
        rank_transports(&mut transports, self.ranking.as_ref());
        info!(transport = %id, count = transports.len(), "transport added");
    }

    /// Detach a transport and drop its fragmentation state.
    pub fn remove_transport(&self, id: TransportId) -> Option<Arc<dyn Transport>> {
        let removed = {
            let mut transports = self.transports.write().unwrap_or_else(PoisonError::into_inner);
            let index = transports.iter().position(|t| t.id() == id)?;
            transports.remove(index)
        };
        self.codec.clear_transport(id);
        info!(transport = %id, "transport removed");
        Some(removed)
    }

    /// Attached transports in ranked order.
    #[must_use]
    pub fn transports(&self) -> Vec<Arc<dyn Transport>> {
        self.transports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Schedule `message`. Depending on its aggregation mode it is sent now
    /// or held for a later flush.
    ///
    /// # Errors
    ///
    /// Returns [`CannotSendMessages`] listing every message this call failed
    /// to send; transports that failed have been removed.
    pub fn send(
        &self,
        message: Message,
        mdr: Option<MessageRequirements>,
        cdr: ChannelRequirements,
    ) -> Result<(), CannotSendMessages> {
        let result = self.scheduler().schedule(self, message, mdr, cdr);
        self.settle(result)
    }

    /// Send every pending message.
    ///
    /// # Errors
    ///
    /// Returns [`CannotSendMessages`] listing every message that failed.
    pub fn flush(&self) -> Result<(), CannotSendMessages> {
        let result = self.scheduler().flush(self);
        self.settle(result)
    }

    /// Send every pending message on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`CannotSendMessages`] listing every message that failed.
    pub fn flush_channel(&self, channel: ChannelId) -> Result<(), CannotSendMessages> {
        let result = self.scheduler().flush_channel(self, channel);
        self.settle(result)
    }

    /// Periodic tick.
    ///
    /// # Errors
    ///
    /// Returns [`CannotSendMessages`] for messages the tick failed to send.
    pub fn update(&self) -> Result<(), CannotSendMessages> {
        let result = self.scheduler().update(self);
        self.settle(result)
    }

    /// Messages waiting for a flush.
    #[must_use]
    pub fn pending(&self) -> usize { self.scheduler().pending() }

    /// Decode a packet received on `transport`, returning every message it
    /// completes in wire order.
    ///
    /// Malformed packets are logged and yield whatever decoded before the
    /// damage.
    pub fn receive(&self, transport: &dyn Transport, packet: Packet) -> Vec<Message> {
        let mut messages = Vec::new();
        if let Err(err) = self.codec.decode(packet, transport, |m| messages.push(m)) {
            warn!(transport = %transport.id(), error = %err, "malformed packet");
        }
        messages
    }

    /// Partial messages held for `transport`.
    #[must_use]
    pub fn pending_reassemblies(&self, transport: TransportId) -> usize {
        self.codec.pending_reassemblies(transport)
    }

    /// Drop pending messages, partial messages and transports.
    pub fn dispose(&self) {
        self.scheduler().reset();
        self.codec.clear();
        self.transports
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("connection disposed");
    }

    fn settle(&self, result: Result<(), CannotSendMessages>) -> Result<(), CannotSendMessages> {
        if let Err(failures) = &result {
            let mut failed: Vec<TransportId> = failures
                .transport_errors()
                .map(TransportError::transport)
                .collect();
            failed.sort_unstable();
            failed.dedup();
            for id in failed {
                if self.remove_transport(id).is_some() {
                    warn!(transport = %id, "removed transport after send failure");
                }
            }
        }
        result
    }
}

impl<C: MessageCodec> Connection for PeerConnection<C> {
    fn find_transport(
        &self,
        mdr: Option<&MessageRequirements>,
        cdr: &ChannelRequirements,
    ) -> Result<Arc<dyn Transport>, NoMatchingTransport> {
        let transports = self.transports.read().unwrap_or_else(PoisonError::into_inner);
        qos::find_transport(&transports, mdr, cdr)
            .cloned()
            .ok_or(NoMatchingTransport {
                message: mdr.copied(),
                channel: *cdr,
            })
    }

    fn marshal(
        &self,
        message: &Message,
        transport: &dyn Transport,
    ) -> Result<MarshalledResult, MarshallingError> {
        self.codec.encode(message, transport)
    }

    fn send_packet(&self, transport: &dyn Transport, packet: Packet) -> Result<(), TransportError> {
        transport.send(packet)
    }
}

impl<C> fmt::Debug for PeerConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transports: Vec<TransportId> = self
            .transports
            .read()
            .map(|t| t.iter().map(|t| t.id()).collect())
            .unwrap_or_default();
        f.debug_struct("PeerConnection")
            .field("transports", &transports)
            .finish_non_exhaustive()
    }
}
