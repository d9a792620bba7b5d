//! Delivery requirements and transport selection.
//!
//! Transports advertise guarantees; channels and messages state requirements.
//! A transport satisfies a requirement when its reliability and ordering are
//! at least those required. Selection walks a ranked transport list and takes
//! the first match, trying a message's own requirement before its channel's.

use std::{cmp, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::transport::{Transport, TransportId};

/// Whether delivery is guaranteed.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Reliability {
    #[default]
    Unreliable,
    Reliable,
}

/// Ordering guarantee, weakest first.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Ordering {
    #[default]
    Unordered,
    /// Stale messages may be dropped but never delivered out of order.
    Sequenced,
    Ordered,
}

/// When a scheduled message is pushed to the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    /// Held until an explicit flush.
    #[default]
    Aggregatable,
    /// Sent first, together with everything else pending.
    Immediate,
    /// Sent after every pending message on its channel.
    FlushChannel,
    /// Sent after every pending message.
    FlushAll,
}

/// Whether a channel keeps superseded messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Freshness {
    #[default]
    IncludeAll,
    /// A new message discards older unsent messages on the same channel.
    IncludeLatestOnly,
}

/// Guarantees and limits advertised by a transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportCharacteristics {
    pub reliability: Reliability,
    pub ordering: Ordering,
    /// Typical one-way delay; used to rank otherwise equal transports.
    pub delay: Duration,
    pub max_packet_size: usize,
}

impl TransportCharacteristics {
    #[must_use]
    pub const fn new(reliability: Reliability, ordering: Ordering, max_packet_size: usize) -> Self {
        Self {
            reliability,
            ordering,
            delay: Duration::ZERO,
            max_packet_size,
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn satisfies(&self, reliability: Reliability, ordering: Ordering) -> bool {
        self.reliability >= reliability && self.ordering >= ordering
    }
}

/// Something a transport can be checked against.
pub trait Requirement {
    /// Whether `transport` satisfies this requirement.
    fn meets(&self, transport: &dyn Transport) -> bool;

    /// First transport in `transports` satisfying this requirement.
    fn select<'a>(&self, transports: &'a [Arc<dyn Transport>]) -> Option<&'a Arc<dyn Transport>> {
        transports.iter().find(|t| self.meets(t.as_ref()))
    }
}

/// Per-message requirements, overriding the channel's when present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageRequirements {
    reliability: Reliability,
    ordering: Ordering,
    aggregation: Aggregation,
    specific: Option<TransportId>,
}

impl MessageRequirements {
    #[must_use]
    pub const fn new(reliability: Reliability, ordering: Ordering, aggregation: Aggregation) -> Self {
        Self {
            reliability,
            ordering,
            aggregation,
            specific: None,
        }
    }

    /// Match exactly one transport, bypassing capability checks. Used for
    /// control traffic such as pings and identity exchange.
    #[must_use]
    pub const fn specific(transport: TransportId) -> Self {
        Self {
            reliability: Reliability::Unreliable,
            ordering: Ordering::Unordered,
            aggregation: Aggregation::Immediate,
            specific: Some(transport),
        }
    }

    #[must_use]
    pub const fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Reliable, ordered, flushed immediately with everything else.
    #[must_use]
    pub const fn most_strict() -> Self {
        Self::new(Reliability::Reliable, Ordering::Ordered, Aggregation::FlushAll)
    }

    #[must_use]
    pub const fn least_strict() -> Self {
        Self::new(Reliability::Unreliable, Ordering::Unordered, Aggregation::Aggregatable)
    }

    #[must_use]
    pub const fn reliability(&self) -> Reliability { self.reliability }

    #[must_use]
    pub const fn ordering(&self) -> Ordering { self.ordering }

    #[must_use]
    pub const fn aggregation(&self) -> Aggregation { self.aggregation }

    /// Transport this requirement is pinned to, if any.
    #[must_use]
    pub const fn specific_transport(&self) -> Option<TransportId> { self.specific }
}

impl Default for MessageRequirements {
    fn default() -> Self { Self::least_strict() }
}

impl Requirement for MessageRequirements {
    fn meets(&self, transport: &dyn Transport) -> bool {
        match self.specific {
            Some(id) => transport.id() == id,
            None => transport
                .characteristics()
                .satisfies(self.reliability, self.ordering),
        }
    }
}

/// Requirements shared by every message on a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRequirements {
    pub reliability: Reliability,
    pub ordering: Ordering,
    pub aggregation: Aggregation,
    pub freshness: Freshness,
}

impl ChannelRequirements {
    #[must_use]
    pub const fn new(reliability: Reliability, ordering: Ordering, aggregation: Aggregation) -> Self {
        Self {
            reliability,
            ordering,
            aggregation,
            freshness: Freshness::IncludeAll,
        }
    }

    #[must_use]
    pub const fn with_freshness(mut self, freshness: Freshness) -> Self {
        self.freshness = freshness;
        self
    }

    #[must_use]
    pub const fn most_strict() -> Self {
        Self::new(Reliability::Reliable, Ordering::Ordered, Aggregation::FlushAll)
    }

    #[must_use]
    pub const fn least_strict() -> Self {
        Self::new(Reliability::Unreliable, Ordering::Unordered, Aggregation::Aggregatable)
    }

    /// Telepointers and similar awareness data: only the newest value
    /// matters and it may be lost.
    #[must_use]
    pub const fn awareness_like() -> Self {
        Self::new(Reliability::Unreliable, Ordering::Sequenced, Aggregation::Aggregatable)
            .with_freshness(Freshness::IncludeLatestOnly)
    }

    #[must_use]
    pub const fn chat_like() -> Self {
        Self::new(Reliability::Reliable, Ordering::Ordered, Aggregation::FlushChannel)
    }

    #[must_use]
    pub const fn commands_like() -> Self {
        Self::new(Reliability::Reliable, Ordering::Ordered, Aggregation::FlushChannel)
    }

    #[must_use]
    pub const fn session_like() -> Self {
        Self::new(Reliability::Reliable, Ordering::Unordered, Aggregation::FlushAll)
    }

    /// Bulk data that must arrive intact; flushed by the application.
    #[must_use]
    pub const fn data() -> Self {
        Self::new(Reliability::Reliable, Ordering::Ordered, Aggregation::Aggregatable)
    }
}

impl Requirement for ChannelRequirements {
    fn meets(&self, transport: &dyn Transport) -> bool {
        transport
            .characteristics()
            .satisfies(self.reliability, self.ordering)
    }
}

/// Aggregation in force for a message: its own if given, else its channel's.
#[must_use]
pub fn effective_aggregation(
    message: Option<&MessageRequirements>,
    channel: &ChannelRequirements,
) -> Aggregation {
    message.map_or(channel.aggregation, MessageRequirements::aggregation)
}

/// Pick a transport for a message, trying its own requirement first and its
/// channel's second.
#[must_use]
pub fn find_transport<'a>(
    transports: &'a [Arc<dyn Transport>],
    message: Option<&MessageRequirements>,
    channel: &ChannelRequirements,
) -> Option<&'a Arc<dyn Transport>> {
    message
        .and_then(|mdr| mdr.select(transports))
        .or_else(|| channel.select(transports))
}

/// Order in which transports are offered to requirements.
pub trait TransportRanking: Send + Sync {
    fn compare(&self, a: &TransportCharacteristics, b: &TransportCharacteristics) -> cmp::Ordering;
}

/// Ascending reliability, then ordering, then delay: the cheapest transport
/// that meets a requirement wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRanking;

impl TransportRanking for DefaultRanking {
    fn compare(&self, a: &TransportCharacteristics, b: &TransportCharacteristics) -> cmp::Ordering {
        a.reliability
            .cmp(&b.reliability)
            .then(a.ordering.cmp(&b.ordering))
            .then(a.delay.cmp(&b.delay))
    }
}

/// Stable-sort `transports` by `ranking`.
pub fn rank_transports(transports: &mut [Arc<dyn Transport>], ranking: &dyn TransportRanking) {
    transports.sort_by(|a, b| ranking.compare(&a.characteristics(), &b.characteristics()));
}
