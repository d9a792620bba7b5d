//! Test doubles and helpers for exercising a
//! [`PeerConnection`](groupwire::connection::PeerConnection) without sockets.
//!
//! [`RecordingTransport`] keeps the bytes of every packet it is handed and
//! can be told to fail. [`pump`] replays those bytes into another connection,
//! and [`split_units`] breaks them back into header-delimited wire units for
//! assertions.
//!
//! ```rust
//! use groupwire::{
//!     connection::PeerConnection,
//!     message::{ChannelId, Message},
//!     qos::ChannelRequirements,
//! };
//! use groupwire_testing::{RecordingTransport, pump};
//!
//! let sender = PeerConnection::builder().build().unwrap();
//! let receiver = PeerConnection::builder().build().unwrap();
//! let out = RecordingTransport::reliable(1, 1024);
//! let inbound = RecordingTransport::reliable(1, 1024);
//! sender.add_transport(out.clone());
//! sender
//!     .send(Message::string(ChannelId::new(1), "hi"), None, ChannelRequirements::chat_like())
//!     .unwrap();
//! let received = pump(&out, &receiver, inbound.as_ref());
//! assert_eq!(received, vec![Message::string(ChannelId::new(1), "hi")]);
//! ```

pub mod logging;
pub mod metrics;
pub mod transports;
pub mod wire;

pub use logging::{LoggerHandle, logger};
pub use metrics::{counter, recorder};
pub use transports::{RecordingTransport, pump};
pub use wire::{WireUnit, split_units};
