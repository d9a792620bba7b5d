//! In-memory transport double.

use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering},
};

use bytes::{Bytes, BytesMut};
use groupwire::{
    connection::PeerConnection,
    message::Message,
    packet::Packet,
    qos::{Ordering, Reliability, TransportCharacteristics},
    transport::{Transport, TransportError, TransportId},
};

/// Transport that records the bytes of every packet it is handed, gathered
/// segment by segment as a socket's vectored write would.
///
/// Sends fail with [`TransportError::Closed`] once the transport is closed,
/// or with [`TransportError::Failed`] after [`fail_after`](Self::fail_after)
/// further packets.
#[derive(Debug)]
pub struct RecordingTransport {
    id: TransportId,
    characteristics: TransportCharacteristics,
    sent: Mutex<Vec<Bytes>>,
    closed: AtomicBool,
    remaining: AtomicUsize,
}

impl RecordingTransport {
    /// Create a transport with the given guarantees.
    #[must_use]
    pub fn new(id: u64, characteristics: TransportCharacteristics) -> Arc<Self> {
        Arc::new(Self {
            id: TransportId::new(id),
            characteristics,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            remaining: AtomicUsize::new(usize::MAX),
        })
    }

    /// A reliable, ordered transport.
    #[must_use]
    pub fn reliable(id: u64, max_packet_size: usize) -> Arc<Self> {
        Self::new(
            id,
            TransportCharacteristics::new(Reliability::Reliable, Ordering::Ordered, max_packet_size),
        )
    }

    /// An unreliable, unordered transport.
    #[must_use]
    pub fn unreliable(id: u64, max_packet_size: usize) -> Arc<Self> {
        Self::new(
            id,
            TransportCharacteristics::new(
                Reliability::Unreliable,
                Ordering::Unordered,
                max_packet_size,
            ),
        )
    }

    /// Make every later send fail with [`TransportError::Closed`].
    pub fn close(&self) { self.closed.store(true, AtomicOrdering::SeqCst); }

    /// Accept `packets` more packets, then fail.
    pub fn fail_after(&self, packets: usize) {
        self.remaining.store(packets, AtomicOrdering::SeqCst);
    }

    /// Bytes of every packet sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Bytes> { self.lock().clone() }

    /// Remove and return the bytes sent so far.
    #[must_use]
    pub fn take_sent(&self) -> Vec<Bytes> { std::mem::take(&mut *self.lock()) }

    fn lock(&self) -> MutexGuard<'_, Vec<Bytes>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for RecordingTransport {
    fn id(&self) -> TransportId { self.id }

    fn characteristics(&self) -> TransportCharacteristics { self.characteristics }

    fn send(&self, packet: Packet) -> Result<(), TransportError> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            return Err(TransportError::Closed { transport: self.id });
        }
        let accepted = self
            .remaining
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok();
        if !accepted {
            return Err(TransportError::Failed {
                transport: self.id,
                reason: "injected failure".into(),
            });
        }
        let size = packet.len().unwrap_or_default();
        let limit = self.characteristics.max_packet_size;
        if size > limit {
            return Err(TransportError::PacketTooLarge {
                transport: self.id,
                size,
                limit,
            });
        }
        let chunks = packet.chunks().map_err(|err| TransportError::Failed {
            transport: self.id,
            reason: err.to_string(),
        })?;
        let mut bytes = BytesMut::with_capacity(size);
        for chunk in chunks {
            bytes.extend_from_slice(chunk);
        }
        self.lock().push(bytes.freeze());
        Ok(())
    }
}

/// Replay everything `from` recorded into `to`, as if it arrived on `via`.
///
/// Recorded packets are consumed so successive calls deliver only new traffic.
pub fn pump(from: &RecordingTransport, to: &PeerConnection, via: &dyn Transport) -> Vec<Message> {
    from.take_sent()
        .into_iter()
        .flat_map(|bytes| to.receive(via, Packet::from_slice(to.pool(), &bytes)))
        .collect()
}
