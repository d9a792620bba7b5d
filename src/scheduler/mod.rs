//! Packet schedulers: when and in which order messages reach transports.
//!
//! A scheduler receives messages with their requirements and decides when to
//! marshal them and how to pack the resulting packets into transport sends.
//! Schedulers are driven by their owning [`Connection`] under its lock and
//! never block: transports report backlog through errors.

mod error;
mod immediate;
mod round_robin;

pub use error::{CannotSendMessages, SendError};
pub use immediate::ImmediateScheduler;
pub use round_robin::RoundRobinScheduler;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::{
    connection::Connection,
    message::{ChannelId, Message},
    qos::{ChannelRequirements, MessageRequirements},
    transport::TransportId,
};

/// A message waiting to be sent, with the requirements it was scheduled
/// under.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingMessage {
    pub message: Message,
    pub mdr: Option<MessageRequirements>,
    pub cdr: ChannelRequirements,
}

impl PendingMessage {
    #[must_use]
    pub fn new(message: Message, mdr: Option<MessageRequirements>, cdr: ChannelRequirements) -> Self {
        Self { message, mdr, cdr }
    }
}

/// Messages whose last packet was handed to a transport in one send.
#[derive(Clone, Debug, PartialEq)]
pub struct MessagesSent {
    pub transport: TransportId,
    pub messages: Vec<Message>,
}

/// Which scheduler a connection uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulerKind {
    /// Aggregate messages and rotate between channels on flush.
    #[default]
    RoundRobin,
    /// Marshal and send each message as it is scheduled.
    Immediate,
}

impl SchedulerKind {
    /// Construct the scheduler, reporting sends to `listener` if given.
    #[must_use]
    pub fn build(self, listener: Option<UnboundedSender<MessagesSent>>) -> Box<dyn PacketScheduler> {
        match self {
            Self::RoundRobin => Box::new(RoundRobinScheduler::new(listener)),
            Self::Immediate => Box::new(ImmediateScheduler::new(listener)),
        }
    }
}

/// Strategy for turning scheduled messages into transport sends.
///
/// Every method reports the messages it failed to send once, in aggregate;
/// messages that could be sent are sent regardless.
pub trait PacketScheduler: Send {
    /// Queue `message`, sending whatever its aggregation mode requires now.
    ///
    /// # Errors
    ///
    /// Returns [`CannotSendMessages`] listing every message this call failed
    /// to send.
    fn schedule(
        &mut self,
        cnx: &dyn Connection,
        message: Message,
        mdr: Option<MessageRequirements>,
        cdr: ChannelRequirements,
    ) -> Result<(), CannotSendMessages>;

    /// Periodic tick from the connection's driver.
    ///
    /// # Errors
    ///
    /// Returns [`CannotSendMessages`] for messages the tick failed to send.
    fn update(&mut self, _cnx: &dyn Connection) -> Result<(), CannotSendMessages> { Ok(()) }

    /// Send every pending message.
    ///
    /// # Errors
    ///
    /// Returns [`CannotSendMessages`] listing every message that failed.
    fn flush(&mut self, cnx: &dyn Connection) -> Result<(), CannotSendMessages>;

    /// Send every pending message on `channel`, plus control messages.
    ///
    /// # Errors
    ///
    /// Returns [`CannotSendMessages`] listing every message that failed.
    fn flush_channel(
        &mut self,
        cnx: &dyn Connection,
        channel: ChannelId,
    ) -> Result<(), CannotSendMessages>;

    /// Number of messages waiting to be sent.
    fn pending(&self) -> usize;

    /// Drop all pending state without sending.
    fn reset(&mut self);
}

fn notify_sent(
    listener: Option<&UnboundedSender<MessagesSent>>,
    transport: TransportId,
    messages: Vec<Message>,
) {
    if messages.is_empty() {
        return;
    }
    crate::metrics::inc_messages_sent(messages.len());
    if let Some(listener) = listener
        && listener.send(MessagesSent { transport, messages }).is_err()
    {
        trace!(%transport, "sent-message listener dropped");
    }
}
