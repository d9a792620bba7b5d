//! Reassembly of fragmented messages received on one transport.
//!
//! [`Sequences`] owns one [`FragmentedMessage`] per outstanding sequence
//! number. On transports that may lose fragments it also owns a
//! [`SlidingWindow`]; sets whose number slides out of the window are dropped
//! with their buffered fragments.

use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};

use super::{FragmentSubHeader, ReassemblyError, SequenceNumber, SlidingWindow, config::SEQUENCE_CAPACITY};
use crate::{
    packet::{Packet, PacketError},
    wire::MessageType,
};

/// Fragments collected so far for one sequence number.
///
/// Slots are keyed by fragment index; duplicates are ignored. The expected
/// count is unknown (`None`) until the first fragment arrives.
#[derive(Debug)]
pub struct FragmentedMessage {
    kind: MessageType,
    channel: u8,
    expected: Option<u32>,
    fragments: BTreeMap<u32, Packet>,
}

impl FragmentedMessage {
    #[must_use]
    pub fn new(kind: MessageType, channel: u8) -> Self {
        Self {
            kind,
            channel,
            expected: None,
            fragments: BTreeMap::new(),
        }
    }

    /// Announced fragment count, once the first fragment has arrived.
    #[must_use]
    pub const fn expected(&self) -> Option<u32> { self.expected }

    /// Number of distinct fragments held.
    #[must_use]
    pub fn received(&self) -> usize { self.fragments.len() }

    /// Whether every announced fragment is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.expected
            .is_some_and(|count| usize::try_from(count).is_ok_and(|count| count == self.fragments.len()))
    }

    /// Store one fragment body. Returns `Ok(true)` once the set is complete.
    ///
    /// # Errors
    ///
    /// Returns a [`ReassemblyError`] if the fragment contradicts what is
    /// already known about the set; the record is left unchanged.
    pub fn record(&mut self, header: FragmentSubHeader, body: Packet) -> Result<bool, ReassemblyError> {
        let seq = header.seq();
        check_header(header)?;
        match header {
            FragmentSubHeader::First { count, .. } => match self.expected {
                Some(expected) if expected != count => {
                    return Err(ReassemblyError::CountMismatch {
                        seq,
                        expected,
                        found: count,
                    });
                }
                Some(_) => {}
                None => {
                    if let Some((&index, _)) = self.fragments.range(count..).next() {
                        return Err(ReassemblyError::IndexBeyondCount { seq, index, count });
                    }
                    self.expected = Some(count);
                }
            },
            FragmentSubHeader::Continuation { index, .. } => {
                if let Some(count) = self.expected.filter(|count| index >= *count) {
                    return Err(ReassemblyError::IndexBeyondCount { seq, index, count });
                }
            }
        }
        let index = header.index();
        if self.fragments.contains_key(&index) {
            trace!("sequence {seq}: duplicate fragment {index} ignored");
        } else {
            self.fragments.insert(index, body);
        }
        Ok(self.is_complete())
    }

    /// Concatenate the fragments in index order.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError`] if a stored fragment was already released.
    pub fn assemble(self) -> Result<Packet, PacketError> {
        let mut fragments = self.fragments.into_values();
        let Some(mut message) = fragments.next() else {
            return Err(PacketError::Disposed);
        };
        for fragment in fragments {
            message.append_packet(&fragment)?;
        }
        Ok(message)
    }
}

/// Reject sub-headers that are malformed on their own, whatever the state
/// of their set.
fn check_header(header: FragmentSubHeader) -> Result<(), ReassemblyError> {
    match header {
        FragmentSubHeader::First { seq, count: 0 } => Err(ReassemblyError::ZeroFragmentCount { seq }),
        FragmentSubHeader::Continuation { seq, index: 0 } => {
            Err(ReassemblyError::ZeroContinuationIndex { seq })
        }
        _ => Ok(()),
    }
}

/// A fully reassembled message body with the type and channel its fragments
/// carried.
#[derive(Debug)]
pub struct Reassembled {
    pub kind: MessageType,
    pub channel: u8,
    pub body: Packet,
}

#[derive(Debug)]
enum Slot {
    Assembling(FragmentedMessage),
    /// Delivered; late fragments for this number are rejected until it is
    /// reused or expires.
    Completed,
}

/// Reassembly state for one transport.
#[derive(Debug)]
pub struct Sequences {
    window: Option<SlidingWindow>,
    slots: HashMap<SequenceNumber, Slot>,
}

impl Sequences {
    /// State for a transport that never loses fragments.
    #[must_use]
    pub fn lossless() -> Self {
        Self {
            window: None,
            slots: HashMap::new(),
        }
    }

    /// State bounded to `window_size` outstanding sequence numbers. Sizes
    /// outside `1..128` fall back to unbounded state.
    #[must_use]
    pub fn windowed(window_size: u8) -> Self {
        Self {
            window: SlidingWindow::new(u32::from(SEQUENCE_CAPACITY), u32::from(window_size)),
            slots: HashMap::new(),
        }
    }

    /// Whether a sliding window bounds this state.
    #[must_use]
    pub const fn is_windowed(&self) -> bool { self.window.is_some() }

    /// Number of partially received messages.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Assembling(_)))
            .count()
    }

    /// Partial message held for `seq`, if any.
    #[must_use]
    pub fn get(&self, seq: SequenceNumber) -> Option<&FragmentedMessage> {
        match self.slots.get(&seq) {
            Some(Slot::Assembling(record)) => Some(record),
            _ => None,
        }
    }

    /// Record one received fragment, returning the reassembled body once
    /// its set is complete.
    ///
    /// Out-of-window fragments are dropped and yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError`] for malformed fragments and fragments that
    /// contradict their set; other sets and the window are unaffected.
    pub fn receive(
        &mut self,
        header: FragmentSubHeader,
        kind: MessageType,
        channel: u8,
        body: Packet,
    ) -> Result<Option<Reassembled>, ReassemblyError> {
        let seq = header.seq();
        // Checked before the window moves so a bad fragment cannot expire
        // other sets.
        check_header(header)?;
        let Self { window, slots } = self;
        let windowed = window.is_some();
        if let Some(window) = window.as_mut() {
            let accepted = window.seen(u32::from(seq), |expired| {
                let Some(expired) = u8::try_from(expired).ok().and_then(SequenceNumber::new) else {
                    return;
                };
                if let Some(Slot::Assembling(record)) = slots.remove(&expired) {
                    debug!(
                        "sequence {expired} expired with {} of {:?} fragments",
                        record.received(),
                        record.expected()
                    );
                    crate::metrics::inc_reassembly_discarded();
                }
            });
            if !accepted {
                trace!("sequence {seq} outside the reassembly window; fragment dropped");
                return Ok(None);
            }
        }

        let slot = slots
            .entry(seq)
            .or_insert_with(|| Slot::Assembling(FragmentedMessage::new(kind, channel)));
        if matches!(slot, Slot::Completed) {
            // Without a window a first fragment may reuse a delivered number;
            // with one, reuse only happens after the tombstone expired.
            if windowed || !matches!(header, FragmentSubHeader::First { .. }) {
                return Err(ReassemblyError::AlreadyComplete { seq });
            }
            *slot = Slot::Assembling(FragmentedMessage::new(kind, channel));
        }
        let Slot::Assembling(record) = slot else {
            return Ok(None);
        };
        match record.record(header, body) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(err) => {
                if record.received() == 0 {
                    slots.remove(&seq);
                }
                return Err(err);
            }
        }

        let Slot::Assembling(record) = std::mem::replace(slot, Slot::Completed) else {
            return Ok(None);
        };
        let (kind, channel) = (record.kind, record.channel);
        match record.assemble() {
            Ok(body) => Ok(Some(Reassembled { kind, channel, body })),
            Err(err) => {
                debug!("sequence {seq}: reassembly failed: {err}");
                Ok(None)
            }
        }
    }

    /// Drop every partial message and tombstone.
    pub fn clear(&mut self) {
        self.slots.clear();
        if let Some(window) = &mut self.window {
            window.reset();
        }
    }
}
