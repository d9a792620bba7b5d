//! Connections: the owner of transports, codec and scheduler for one peer.
//!
//! Schedulers talk to their connection through the [`Connection`] trait,
//! which finds a transport for a message, marshals it and hands packets to
//! the transport. [`PeerConnection`] is the standard implementation.

mod builder;
mod peer;

use std::sync::Arc;

pub use builder::{ConnectionConfig, ConnectionError, PeerConnectionBuilder};
pub use peer::PeerConnection;
use thiserror::Error;

use crate::{
    codec::{MarshalledResult, MarshallingError},
    message::Message,
    packet::Packet,
    qos::{ChannelRequirements, MessageRequirements},
    transport::{Transport, TransportError},
};

/// No transport satisfies a message's requirements.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("no transport satisfies message requirements {message:?} or channel requirements {channel:?}")]
pub struct NoMatchingTransport {
    pub message: Option<MessageRequirements>,
    pub channel: ChannelRequirements,
}

/// Services a scheduler needs from the connection that owns it.
pub trait Connection: Send + Sync {
    /// Pick a transport, trying `mdr` before `cdr`.
    ///
    /// # Errors
    ///
    /// Returns [`NoMatchingTransport`] if no transport qualifies.
    fn find_transport(
        &self,
        mdr: Option<&MessageRequirements>,
        cdr: &ChannelRequirements,
    ) -> Result<Arc<dyn Transport>, NoMatchingTransport>;

    /// Encode `message` into packets that fit `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshallingError`] if the message cannot be encoded.
    fn marshal(
        &self,
        message: &Message,
        transport: &dyn Transport,
    ) -> Result<MarshalledResult, MarshallingError>;

    /// Hand `packet` to `transport`.
    ///
    /// # Errors
    ///
    /// Returns the transport's [`TransportError`].
    fn send_packet(&self, transport: &dyn Transport, packet: Packet) -> Result<(), TransportError>;
}
