//! Helpers shared by unit tests across modules.

use std::sync::{
    Arc,
    Mutex,
    atomic::{AtomicBool, Ordering as AtomicOrdering},
};

use bytes::Bytes;
use proptest::test_runner::{Config as ProptestConfig, RngAlgorithm, TestRng, TestRunner};

use crate::{
    packet::Packet,
    qos::{Ordering, Reliability, TransportCharacteristics},
    transport::{Transport, TransportError, TransportId},
};

pub(crate) fn deterministic_runner(cases: u32) -> TestRunner {
    let config = ProptestConfig {
        cases,
        ..ProptestConfig::default()
    };
    let rng = TestRng::deterministic_rng(RngAlgorithm::ChaCha);
    TestRunner::new_with_rng(config, rng)
}

/// Transport that keeps the bytes of every packet it is handed.
#[derive(Debug)]
pub(crate) struct CapturingTransport {
    id: TransportId,
    characteristics: TransportCharacteristics,
    sent: Mutex<Vec<Bytes>>,
    closed: AtomicBool,
}

impl CapturingTransport {
    pub(crate) fn new(id: u64, characteristics: TransportCharacteristics) -> Arc<Self> {
        Arc::new(Self {
            id: TransportId::new(id),
            characteristics,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn reliable(id: u64, max_packet_size: usize) -> Arc<Self> {
        Self::new(
            id,
            TransportCharacteristics::new(Reliability::Reliable, Ordering::Ordered, max_packet_size),
        )
    }

    pub(crate) fn unreliable(id: u64, max_packet_size: usize) -> Arc<Self> {
        Self::new(
            id,
            TransportCharacteristics::new(
                Reliability::Unreliable,
                Ordering::Unordered,
                max_packet_size,
            ),
        )
    }

    /// Make every later send fail.
    pub(crate) fn close(&self) { self.closed.store(true, AtomicOrdering::SeqCst); }

    pub(crate) fn sent(&self) -> Vec<Bytes> { self.sent.lock().expect("sent lock").clone() }

    pub(crate) fn take_sent(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.sent.lock().expect("sent lock"))
    }
}

impl Transport for CapturingTransport {
    fn id(&self) -> TransportId { self.id }

    fn characteristics(&self) -> TransportCharacteristics { self.characteristics }

    fn send(&self, packet: Packet) -> Result<(), TransportError> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            return Err(TransportError::Closed { transport: self.id });
        }
        let bytes = packet.to_bytes().expect("live packet");
        self.sent.lock().expect("sent lock").push(bytes);
        Ok(())
    }
}
