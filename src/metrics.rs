//! Metric helpers for `groupwire`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers do nothing.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking messages handed to a transport.
pub const MESSAGES_SENT: &str = "groupwire_messages_sent_total";
/// Name of the counter tracking transport packets sent.
pub const PACKETS_SENT: &str = "groupwire_packets_sent_total";
/// Name of the counter tracking fragments produced by fragmentation.
pub const FRAGMENTS_EMITTED: &str = "groupwire_fragments_emitted_total";
/// Name of the counter tracking partial messages dropped by reassembly.
pub const REASSEMBLY_DISCARDED: &str = "groupwire_reassembly_discarded_total";
/// Name of the counter tracking messages that could not be sent.
pub const SEND_FAILURES: &str = "groupwire_send_failures_total";

/// Why a message failed to go out.
#[derive(Clone, Copy, Debug)]
pub enum FailureKind {
    /// No transport satisfied the message's requirements.
    NoTransport,
    /// The message could not be encoded.
    Marshalling,
    /// The transport rejected the packet.
    Transport,
}

impl FailureKind {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code, reason = "labels need the metrics feature"))]
    fn as_str(self) -> &'static str {
        match self {
            FailureKind::NoTransport => "no_transport",
            FailureKind::Marshalling => "marshalling",
            FailureKind::Transport => "transport",
        }
    }
}

/// Record `count` messages completed by a transport packet.
pub fn inc_messages_sent(count: usize) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_SENT).increment(u64::try_from(count).unwrap_or(u64::MAX));
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record one transport packet sent.
pub fn inc_packets_sent() {
    #[cfg(feature = "metrics")]
    counter!(PACKETS_SENT).increment(1);
}

/// Record `count` fragments produced for one message.
pub fn inc_fragments(count: usize) {
    #[cfg(feature = "metrics")]
    counter!(FRAGMENTS_EMITTED).increment(u64::try_from(count).unwrap_or(u64::MAX));
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record a partial message dropped when its sequence number expired.
pub fn inc_reassembly_discarded() {
    #[cfg(feature = "metrics")]
    counter!(REASSEMBLY_DISCARDED).increment(1);
}

/// Record `count` messages that failed for the given reason.
pub fn inc_send_failures(kind: FailureKind, count: usize) {
    #[cfg(feature = "metrics")]
    counter!(SEND_FAILURES, "kind" => kind.as_str())
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
    #[cfg(not(feature = "metrics"))]
    let _ = (kind, count);
}
