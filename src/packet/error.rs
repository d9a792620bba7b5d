//! Error types raised by packet and pool operations.

use thiserror::Error;

/// Errors raised when operating on a [`Packet`](crate::packet::Packet).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PacketError {
    /// The packet was released to zero references and can no longer be used.
    #[error("packet has been disposed")]
    Disposed,
    /// The requested byte range lies outside the packet's current length.
    #[error("range {offset}..{offset}+{len} is outside a packet of {available} bytes")]
    OutOfRange {
        offset: usize,
        len: usize,
        available: usize,
    },
}

/// Errors raised while validating a [`PoolConfig`](crate::packet::PoolConfig).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PoolConfigError {
    /// Segment sizes must be powers of two.
    #[error("segment size {0} is not a power of two")]
    NotPowerOfTwo(usize),
    /// The minimum segment size exceeds the maximum.
    #[error("minimum segment size {min} exceeds maximum {max}")]
    InvertedBounds { min: usize, max: usize },
    /// The head-room reservation would consume a whole minimum-size segment.
    #[error("reserved head-room {head_room} must be smaller than the minimum segment size {min}")]
    HeadRoomTooLarge { head_room: usize, min: usize },
}
