//! Scheduler that sends each message as soon as it is scheduled.

use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use super::{CannotSendMessages, MessagesSent, PacketScheduler, PendingMessage, SendError, notify_sent};
use crate::{
    connection::Connection,
    message::{ChannelId, Message},
    qos::{ChannelRequirements, MessageRequirements},
};

/// FIFO scheduler: every packet of a message goes out in its own send, in
/// scheduling order. Flushing does nothing.
pub struct ImmediateScheduler {
    listener: Option<UnboundedSender<MessagesSent>>,
}

impl ImmediateScheduler {
    #[must_use]
    pub fn new(listener: Option<UnboundedSender<MessagesSent>>) -> Self { Self { listener } }

    fn send_now(&self, cnx: &dyn Connection, pending: &PendingMessage) -> Result<(), SendError> {
        let transport = cnx.find_transport(pending.mdr.as_ref(), &pending.cdr)?;
        let marshalled = cnx.marshal(&pending.message, transport.as_ref())?;
        for packet in marshalled {
            cnx.send_packet(transport.as_ref(), packet)?;
            crate::metrics::inc_packets_sent();
        }
        notify_sent(
            self.listener.as_ref(),
            transport.id(),
            vec![pending.message.clone()],
        );
        Ok(())
    }
}

impl PacketScheduler for ImmediateScheduler {
    fn schedule(
        &mut self,
        cnx: &dyn Connection,
        message: Message,
        mdr: Option<MessageRequirements>,
        cdr: ChannelRequirements,
    ) -> Result<(), CannotSendMessages> {
        let pending = PendingMessage::new(message, mdr, cdr);
        let mut failures = CannotSendMessages::new();
        if let Err(err) = self.send_now(cnx, &pending) {
            warn!(channel = %pending.message.channel(), error = %err, "message not sent");
            failures.add(err, pending);
        }
        failures.into_result()
    }

    fn flush(&mut self, _cnx: &dyn Connection) -> Result<(), CannotSendMessages> { Ok(()) }

    fn flush_channel(
        &mut self,
        _cnx: &dyn Connection,
        _channel: ChannelId,
    ) -> Result<(), CannotSendMessages> {
        Ok(())
    }

    fn pending(&self) -> usize { 0 }

    fn reset(&mut self) {}
}
