//! The transport seam consumed by the pipeline.
//!
//! Concrete socket transports live outside this crate. They describe their
//! guarantees through [`TransportCharacteristics`], accept outbound packets
//! through [`Transport::send`], and hand inbound packets to
//! [`PeerConnection::receive`](crate::connection::PeerConnection::receive).

use std::fmt;

use derive_more::{Display, From, Into};
use thiserror::Error;

use crate::{
    packet::Packet,
    qos::{Ordering, Reliability, TransportCharacteristics},
};

/// Identifier of a transport instance within a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
#[display("{_0}")]
pub struct TransportId(u64);

impl TransportId {
    /// Create a new identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self { Self(value) }

    /// Return the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

/// A packet-oriented channel to a remote peer.
///
/// `send` takes ownership of the packet and must not block on I/O; backlog
/// and failure are reported through [`TransportError`].
pub trait Transport: Send + Sync + fmt::Debug {
    /// Stable identifier for this transport instance.
    fn id(&self) -> TransportId;

    /// Delivery guarantees and limits.
    fn characteristics(&self) -> TransportCharacteristics;

    /// Hand a packet to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the transport cannot accept the packet.
    fn send(&self, packet: Packet) -> Result<(), TransportError>;

    /// Largest packet, in bytes, the transport accepts.
    fn max_packet_size(&self) -> usize { self.characteristics().max_packet_size }

    /// Reliability guarantee.
    fn reliability(&self) -> Reliability { self.characteristics().reliability }

    /// Ordering guarantee.
    fn ordering(&self) -> Ordering { self.characteristics().ordering }
}

/// Failures raised by a transport; each is fatal to that transport only.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The transport has shut down.
    #[error("transport {transport} is closed")]
    Closed { transport: TransportId },
    /// The packet exceeds the transport's maximum size.
    #[error("transport {transport} cannot carry {size} bytes (limit {limit})")]
    PacketTooLarge {
        transport: TransportId,
        size: usize,
        limit: usize,
    },
    /// Any other I/O failure.
    #[error("transport {transport} failed: {reason}")]
    Failed {
        transport: TransportId,
        reason: String,
    },
}

impl TransportError {
    /// Transport that raised the error.
    #[must_use]
    pub const fn transport(&self) -> TransportId {
        match self {
            Self::Closed { transport }
            | Self::PacketTooLarge { transport, .. }
            | Self::Failed { transport, .. } => *transport,
        }
    }
}
