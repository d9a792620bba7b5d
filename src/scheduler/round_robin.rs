//! Round-robin aggregation across channels.
//!
//! Pending messages live in one queue. Channels are registered in arrival
//! order; a flush takes one packet at a time from the current channel's
//! message and then moves to the next channel, so a channel with a long
//! backlog cannot starve the others. A channel with nothing left is dropped
//! from the rotation. Packets bound for the same transport are packed
//! together up to the transport's packet limit.

use std::{collections::VecDeque, mem, sync::Arc};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

use super::{CannotSendMessages, MessagesSent, PacketScheduler, PendingMessage, SendError, notify_sent};
use crate::{
    codec::MarshalledResult,
    connection::Connection,
    message::{ChannelId, Message},
    packet::Packet,
    qos::{Aggregation, ChannelRequirements, Freshness, MessageRequirements, effective_aggregation},
    transport::{Transport, TransportError},
};

/// The message a channel is part-way through sending.
struct ChannelSendingState {
    channel: ChannelId,
    pending: PendingMessage,
    marshalled: MarshalledResult,
    transport: Arc<dyn Transport>,
}

/// Bytes accumulated for one transport during a flush.
struct Outbound {
    transport: Arc<dyn Transport>,
    packet: Option<Packet>,
    /// Messages whose final packet sits in `packet`.
    completed: Vec<PendingMessage>,
}

/// Aggregating scheduler that rotates between channels.
///
/// # Examples
///
/// ```
/// use groupwire::scheduler::{PacketScheduler, RoundRobinScheduler};
///
/// let scheduler = RoundRobinScheduler::new(None);
/// assert_eq!(scheduler.pending(), 0);
/// ```
pub struct RoundRobinScheduler {
    pending: VecDeque<PendingMessage>,
    channels: Vec<ChannelId>,
    next_channel: usize,
    sending: Vec<ChannelSendingState>,
    outbound: Vec<Outbound>,
    failed: Vec<TransportError>,
    listener: Option<UnboundedSender<MessagesSent>>,
}

impl RoundRobinScheduler {
    #[must_use]
    pub fn new(listener: Option<UnboundedSender<MessagesSent>>) -> Self {
        Self {
            pending: VecDeque::new(),
            channels: Vec::new(),
            next_channel: 0,
            sending: Vec::new(),
            outbound: Vec::new(),
            failed: Vec::new(),
            listener,
        }
    }

    /// Channels currently in the rotation, in registration order.
    #[must_use]
    pub fn channels(&self) -> &[ChannelId] { &self.channels }

    fn aggregate(&mut self, message: Message, mdr: Option<MessageRequirements>, cdr: ChannelRequirements) {
        let channel = message.channel();
        if !message.is_control() && cdr.freshness == Freshness::IncludeLatestOnly {
            let before = self.pending.len();
            self.pending
                .retain(|p| p.message.channel() != channel || p.message.is_control());
            let superseded = before - self.pending.len();
            if superseded > 0 {
                trace!(%channel, superseded, "dropped stale messages");
            }
        }

        let index = match self.channels.iter().position(|c| *c == channel) {
            Some(index) => index,
            None => {
                self.channels.push(channel);
                self.channels.len() - 1
            }
        };

        let pending = PendingMessage::new(message, mdr, cdr);
        if effective_aggregation(mdr.as_ref(), &cdr) == Aggregation::Immediate {
            self.pending.push_front(pending);
            self.next_channel = index;
        } else {
            self.pending.push_back(pending);
        }
    }

    /// Take the next queued message for `channel`; control messages belong
    /// to every channel.
    fn next_pending(&mut self, channel: ChannelId) -> Option<PendingMessage> {
        let index = self
            .pending
            .iter()
            .position(|p| p.message.is_control() || p.message.channel() == channel)?;
        self.pending.remove(index)
    }

    /// Find the sending state for `channel`, starting its next message if
    /// the current one is done. Returns `None`, and drops the channel from
    /// the rotation, once nothing is left for it.
    fn find_next_packet(
        &mut self,
        cnx: &dyn Connection,
        channel: ChannelId,
        failures: &mut CannotSendMessages,
    ) -> Option<usize> {
        if let Some(index) = self.sending.iter().position(|s| s.channel == channel) {
            if self.sending[index].marshalled.has_packets() {
                return Some(index);
            }
            self.sending.swap_remove(index);
        }

        while let Some(pending) = self.next_pending(channel) {
            let transport = match cnx.find_transport(pending.mdr.as_ref(), &pending.cdr) {
                Ok(transport) => transport,
                Err(err) => {
                    warn!(%channel, error = %err, "no transport for message");
                    failures.add(SendError::from(err), pending);
                    continue;
                }
            };
            if let Some(err) = self.failed.iter().find(|e| e.transport() == transport.id()) {
                failures.add(SendError::Transport(err.clone()), pending);
                continue;
            }
            match cnx.marshal(&pending.message, transport.as_ref()) {
                Ok(marshalled) if marshalled.has_packets() => {
                    self.sending.push(ChannelSendingState {
                        channel,
                        pending,
                        marshalled,
                        transport,
                    });
                    return Some(self.sending.len() - 1);
                }
                Ok(_) => debug!(%channel, "message marshalled to nothing; dropped"),
                Err(err) => {
                    warn!(%channel, error = %err, "failed to marshal message");
                    failures.add(SendError::from(err), pending);
                }
            }
        }

        if let Some(index) = self.channels.iter().position(|c| *c == channel) {
            self.channels.remove(index);
            if index < self.next_channel {
                self.next_channel -= 1;
            }
        }
        if self.next_channel >= self.channels.len() {
            self.next_channel = 0;
        }
        None
    }

    /// Move one packet of `channel`'s current message into its transport's
    /// accumulation. Returns `false` once the channel has nothing left.
    fn process_next_packet(
        &mut self,
        cnx: &dyn Connection,
        channel: ChannelId,
        failures: &mut CannotSendMessages,
    ) -> bool {
        let Some(index) = self.find_next_packet(cnx, channel, failures) else {
            return false;
        };
        let state = &mut self.sending[index];
        let Some(next) = state.marshalled.remove_packet() else {
            return true;
        };
        let transport = Arc::clone(&state.transport);
        let finished = state.marshalled.is_finished();

        let slot = self.outbound_for(&transport);
        let max = transport.max_packet_size();
        let accumulated = self.outbound[slot].packet.take();
        let packed = match accumulated {
            Some(mut acc) => {
                let acc_len = acc.len().unwrap_or(0);
                let next_len = next.len().unwrap_or(0);
                if acc_len > 0 && acc_len + next_len > max {
                    if let Err(err) = self.send_accumulated(cnx, slot, acc, failures) {
                        self.abandon(&err, failures);
                        return true;
                    }
                    Ok(next)
                } else {
                    acc.append_packet(&next).map(|()| acc)
                }
            }
            None => Ok(next),
        };

        let Some(state_index) = self.sending.iter().position(|s| s.channel == channel) else {
            return true;
        };
        match packed {
            Ok(packet) => self.outbound[slot].packet = Some(packet),
            Err(err) => {
                let state = self.sending.swap_remove(state_index);
                failures.add(SendError::Marshalling(err.into()), state.pending);
                return true;
            }
        }
        if finished {
            let state = self.sending.swap_remove(state_index);
            self.outbound[slot].completed.push(state.pending);
        }
        true
    }

    fn outbound_for(&mut self, transport: &Arc<dyn Transport>) -> usize {
        let id = transport.id();
        if let Some(slot) = self.outbound.iter().position(|o| o.transport.id() == id) {
            return slot;
        }
        self.outbound.push(Outbound {
            transport: Arc::clone(transport),
            packet: None,
            completed: Vec::new(),
        });
        self.outbound.len() - 1
    }

    fn send_accumulated(
        &mut self,
        cnx: &dyn Connection,
        slot: usize,
        packet: Packet,
        failures: &mut CannotSendMessages,
    ) -> Result<(), TransportError> {
        let outbound = &mut self.outbound[slot];
        let transport = Arc::clone(&outbound.transport);
        let completed = mem::take(&mut outbound.completed);
        match cnx.send_packet(transport.as_ref(), packet) {
            Ok(()) => {
                crate::metrics::inc_packets_sent();
                let messages = completed.into_iter().map(|p| p.message).collect();
                notify_sent(self.listener.as_ref(), transport.id(), messages);
                Ok(())
            }
            Err(err) => {
                warn!(transport = %transport.id(), error = %err, "transport send failed");
                failures.add_all(SendError::Transport(err.clone()), completed);
                Err(err)
            }
        }
    }

    /// Give up on every in-progress message bound for the failed transport.
    fn abandon(&mut self, err: &TransportError, failures: &mut CannotSendMessages) {
        let id = err.transport();
        let (lost, kept): (Vec<_>, Vec<_>) = mem::take(&mut self.sending)
            .into_iter()
            .partition(|s| s.transport.id() == id);
        self.sending = kept;
        failures.add_all(
            SendError::Transport(err.clone()),
            lost.into_iter().map(|s| s.pending).collect(),
        );
        if let Some(outbound) = self.outbound.iter_mut().find(|o| o.transport.id() == id) {
            outbound.packet = None;
        }
        self.failed.push(err.clone());
    }

    /// Send every non-empty accumulation and forget per-flush state.
    fn flush_pending_packets(&mut self, cnx: &dyn Connection, failures: &mut CannotSendMessages) {
        for slot in 0..self.outbound.len() {
            let Some(packet) = self.outbound[slot].packet.take() else {
                continue;
            };
            if packet.is_empty().unwrap_or(true) {
                continue;
            }
            if let Err(err) = self.send_accumulated(cnx, slot, packet, failures) {
                self.abandon(&err, failures);
            }
        }
        self.outbound.clear();
        self.failed.clear();
    }
}

impl PacketScheduler for RoundRobinScheduler {
    fn schedule(
        &mut self,
        cnx: &dyn Connection,
        message: Message,
        mdr: Option<MessageRequirements>,
        cdr: ChannelRequirements,
    ) -> Result<(), CannotSendMessages> {
        let channel = message.channel();
        let aggregation = effective_aggregation(mdr.as_ref(), &cdr);
        self.aggregate(message, mdr, cdr);
        match aggregation {
            Aggregation::FlushChannel => self.flush_channel(cnx, channel),
            Aggregation::FlushAll | Aggregation::Immediate => self.flush(cnx),
            Aggregation::Aggregatable => Ok(()),
        }
    }

    fn flush(&mut self, cnx: &dyn Connection) -> Result<(), CannotSendMessages> {
        let mut failures = CannotSendMessages::new();
        while !self.channels.is_empty() {
            let channel = self.channels[self.next_channel];
            if self.process_next_packet(cnx, channel, &mut failures) && !self.channels.is_empty() {
                self.next_channel = (self.next_channel + 1) % self.channels.len();
            }
        }
        self.flush_pending_packets(cnx, &mut failures);
        failures.into_result()
    }

    fn flush_channel(
        &mut self,
        cnx: &dyn Connection,
        channel: ChannelId,
    ) -> Result<(), CannotSendMessages> {
        if !self.channels.contains(&channel) {
            return Ok(());
        }
        let mut failures = CannotSendMessages::new();
        while self.process_next_packet(cnx, channel, &mut failures) {}
        self.flush_pending_packets(cnx, &mut failures);
        failures.into_result()
    }

    fn pending(&self) -> usize { self.pending.len() + self.sending.len() }

    fn reset(&mut self) {
        let dropped = self.pending();
        self.pending.clear();
        self.sending.clear();
        self.outbound.clear();
        self.failed.clear();
        self.channels.clear();
        self.next_channel = 0;
        if dropped > 0 {
            debug!(dropped, "scheduler reset");
        }
    }
}
