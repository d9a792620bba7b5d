#![doc(html_root_url = "https://docs.rs/groupwire/latest")]
//! Message pipeline for groupware peers.
//!
//! `groupwire` turns application [`Message`]s into packets for one or more
//! [`Transport`]s and back again. Packets are segmented buffers drawn from a
//! recycling [`SegmentPool`]; messages larger than a transport's packet limit
//! are split into numbered fragments and reassembled on receipt, with stale
//! partial messages discarded on unreliable transports. A [`PeerConnection`]
//! picks a transport for each message from its delivery requirements and
//! hands it to a [`PacketScheduler`] that batches messages into packets and
//! interleaves channels fairly.
//!
//! ```
//! use groupwire::{
//!     connection::PeerConnection,
//!     message::{ChannelId, Message},
//!     qos::ChannelRequirements,
//! };
//!
//! let connection = PeerConnection::builder().build().expect("valid defaults");
//! // Without a transport the message is reported back as unsendable.
//! let failures = connection
//!     .send(Message::string(ChannelId::new(1), "hi"), None, ChannelRequirements::chat_like())
//!     .expect_err("no transport attached");
//! assert_eq!(failures.message_count(), 1);
//! ```

pub mod byte_order;
pub mod codec;
pub mod connection;
pub mod fragment;
pub mod message;
pub mod metrics;
pub mod packet;
pub mod qos;
pub mod scheduler;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod test_support;

pub use codec::{LightweightCodec, MarshalledResult, MarshallingError, MessageCodec};
pub use connection::{Connection, ConnectionConfig, ConnectionError, PeerConnection};
pub use fragment::{FragmentationConfig, FragmentingCodec, ReassemblyError};
pub use message::{ChannelId, Message, Payload};
pub use packet::{Packet, PacketError, PoolConfig, SegmentPool};
pub use qos::{ChannelRequirements, MessageRequirements};
pub use scheduler::{CannotSendMessages, MessagesSent, PacketScheduler, SchedulerKind, SendError};
pub use transport::{Transport, TransportError, TransportId};
