//! Aggregation, fairness and failure reporting of `RoundRobinScheduler`.

use std::sync::Arc;

use rstest::{fixture, rstest};
use tokio::sync::mpsc;

use super::{StubConnection, Unit, tagged, tags, units};
use crate::{
    connection::NoMatchingTransport,
    message::{ChannelId, Message, SystemMessageKind},
    qos::{Aggregation, ChannelRequirements, MessageRequirements, Ordering, Reliability},
    scheduler::{PacketScheduler, RoundRobinScheduler, SendError},
    test_support::CapturingTransport,
    transport::{Transport, TransportError},
};

const UNIT: usize = 16;

fn aggregatable() -> Option<MessageRequirements> {
    Some(MessageRequirements::new(
        Reliability::Reliable,
        Ordering::Ordered,
        Aggregation::Aggregatable,
    ))
}

fn data() -> ChannelRequirements { ChannelRequirements::data() }

/// Transport that fits exactly one `UNIT`-byte message per packet.
#[fixture]
fn narrow() -> Arc<CapturingTransport> { CapturingTransport::reliable(1, UNIT + 6) }

fn connection(transport: &Arc<CapturingTransport>) -> StubConnection {
    StubConnection::new(vec![transport.clone() as Arc<dyn Transport>])
}

#[test]
fn flush_channel_sends_queued_messages_first() {
    let transport = CapturingTransport::reliable(1, 1024);
    let cnx = connection(&transport);
    let mut scheduler = RoundRobinScheduler::new(None);
    let chat = ChannelRequirements::new(
        Reliability::Reliable,
        Ordering::Ordered,
        Aggregation::FlushChannel,
    );
    scheduler
        .schedule(&cnx, tagged(5, b'A', 4), aggregatable(), chat)
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(5, b'B', 4), aggregatable(), chat)
        .expect("queued");
    assert!(transport.sent().is_empty());
    scheduler
        .schedule(&cnx, tagged(5, b'C', 4), None, chat)
        .expect("flushed");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1, "three small messages share one packet");
    let expected: Vec<Unit> = [b'A', b'B', b'C']
        .into_iter()
        .map(|tag| Unit {
            fragment: false,
            channel: 5,
            body: vec![tag; 4],
        })
        .collect();
    assert_eq!(units(&sent[0]), expected);
}

#[rstest]
fn channels_take_turns(narrow: Arc<CapturingTransport>) {
    let cnx = connection(&narrow);
    let mut scheduler = RoundRobinScheduler::new(None);
    for tag in [b'a', b'b', b'c'] {
        scheduler
            .schedule(&cnx, tagged(1, tag, UNIT), None, data())
            .expect("queued");
    }
    scheduler
        .schedule(&cnx, tagged(2, b'X', UNIT), None, data())
        .expect("queued");
    scheduler.flush(&cnx).expect("flushed");
    assert_eq!(tags(&narrow.sent()), b"aXbc");
    assert_eq!(narrow.sent().len(), 4);
}

#[rstest]
fn fragments_interleave_with_other_channels(narrow: Arc<CapturingTransport>) {
    let cnx = connection(&narrow);
    let mut scheduler = RoundRobinScheduler::new(None);
    scheduler
        .schedule(&cnx, tagged(1, b'L', 30), None, data())
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(2, b'S', 4), None, data())
        .expect("queued");
    scheduler.flush(&cnx).expect("flushed");

    let sent = narrow.sent();
    let layout: Vec<(bool, u8)> = sent
        .iter()
        .flat_map(units)
        .map(|u| (u.fragment, u.channel))
        .collect();
    assert_eq!(layout.len(), 4);
    assert_eq!(layout[0], (true, 1));
    assert_eq!(layout[1], (false, 2), "small message waits for one fragment only");
    assert!(layout[2..].iter().all(|u| *u == (true, 1)));
}

#[test]
fn latest_only_channels_keep_the_newest_message() {
    let transport = CapturingTransport::reliable(1, 1024);
    let cnx = connection(&transport);
    let mut scheduler = RoundRobinScheduler::new(None);
    let awareness = ChannelRequirements::awareness_like();
    scheduler
        .schedule(&cnx, tagged(3, b'1', 2), None, awareness)
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(4, b'o', 2), None, awareness)
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(3, b'2', 2), None, awareness)
        .expect("queued");
    assert_eq!(scheduler.pending(), 2);
    scheduler.flush(&cnx).expect("flushed");
    assert_eq!(tags(&transport.sent()), b"2o");
}

#[test]
fn latest_only_keeps_control_messages() {
    let transport = CapturingTransport::reliable(1, 1024);
    let cnx = connection(&transport);
    let mut scheduler = RoundRobinScheduler::new(None);
    let awareness = ChannelRequirements::awareness_like();
    let ping = Message::system(SystemMessageKind::PingRequest, vec![b'p']);
    scheduler
        .schedule(&cnx, ping, aggregatable(), ChannelRequirements::data())
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(4, b'1', 2), None, awareness)
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(4, b'2', 2), None, awareness)
        .expect("queued");
    scheduler.flush(&cnx).expect("flushed");
    assert_eq!(tags(&transport.sent()), b"p2");
}

#[rstest]
fn flush_channel_leaves_other_channels_queued(narrow: Arc<CapturingTransport>) {
    let cnx = connection(&narrow);
    let mut scheduler = RoundRobinScheduler::new(None);
    scheduler
        .schedule(&cnx, tagged(1, b'a', 4), None, data())
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(2, b'x', 4), None, data())
        .expect("queued");
    scheduler.flush_channel(&cnx, ChannelId::new(1)).expect("flushed");
    assert_eq!(tags(&narrow.take_sent()), b"a");
    assert_eq!(scheduler.pending(), 1);
    assert_eq!(scheduler.channels(), [ChannelId::new(2)]);

    scheduler.flush(&cnx).expect("flushed");
    assert_eq!(tags(&narrow.sent()), b"x");
    assert!(scheduler.channels().is_empty());
}

#[rstest]
fn immediate_messages_go_first(narrow: Arc<CapturingTransport>) {
    let cnx = connection(&narrow);
    let mut scheduler = RoundRobinScheduler::new(None);
    scheduler
        .schedule(&cnx, tagged(1, b'x', 4), None, data())
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(2, b'y', 4), None, data())
        .expect("queued");
    let urgent = Some(MessageRequirements::new(
        Reliability::Reliable,
        Ordering::Ordered,
        Aggregation::Immediate,
    ));
    scheduler
        .schedule(&cnx, tagged(2, b'z', 4), urgent, data())
        .expect("flushed");
    assert_eq!(tags(&narrow.sent()), b"zxy");
    assert_eq!(scheduler.pending(), 0);
}

#[rstest]
fn flush_all_sends_everything(narrow: Arc<CapturingTransport>) {
    let cnx = connection(&narrow);
    let mut scheduler = RoundRobinScheduler::new(None);
    scheduler
        .schedule(&cnx, tagged(1, b'a', 4), None, data())
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(2, b'b', 4), None, ChannelRequirements::most_strict())
        .expect("flushed");
    assert_eq!(tags(&narrow.sent()), b"ab");
}

#[test]
fn packets_fill_up_to_the_limit() {
    let transport = CapturingTransport::reliable(1, 2 * (UNIT + 6));
    let cnx = connection(&transport);
    let mut scheduler = RoundRobinScheduler::new(None);
    for tag in *b"abc" {
        scheduler
            .schedule(&cnx, tagged(1, tag, UNIT), None, data())
            .expect("queued");
    }
    scheduler.flush(&cnx).expect("flushed");
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].len(), 2 * (UNIT + 6));
    assert_eq!(tags(&sent), b"abc");
}

#[test]
fn unmatched_messages_are_reported_and_others_sent() {
    let transport = CapturingTransport::unreliable(1, 1024);
    let cnx = connection(&transport);
    let mut scheduler = RoundRobinScheduler::new(None);
    scheduler
        .schedule(&cnx, tagged(1, b'r', 4), None, data())
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(2, b'u', 4), None, ChannelRequirements::least_strict())
        .expect("queued");
    let failures = scheduler.flush(&cnx).expect_err("reliable message has no transport");

    assert_eq!(tags(&transport.sent()), b"u");
    assert_eq!(failures.message_count(), 1);
    let (error, messages) = &failures.failures()[0];
    assert!(matches!(
        error,
        SendError::NoMatchingTransport(NoMatchingTransport { message: None, .. })
    ));
    assert_eq!(messages[0].message, tagged(1, b'r', 4));
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn transport_failures_are_grouped() {
    let broken = CapturingTransport::reliable(7, 1024);
    broken.close();
    let cnx = connection(&broken);
    let mut scheduler = RoundRobinScheduler::new(None);
    for (channel, tag) in [(1, b'a'), (2, b'b'), (1, b'c')] {
        scheduler
            .schedule(&cnx, tagged(channel, tag, 4), None, data())
            .expect("queued");
    }
    let failures = scheduler.flush(&cnx).expect_err("transport is closed");
    assert_eq!(failures.failures().len(), 1);
    assert_eq!(failures.message_count(), 3);
    let errors: Vec<&TransportError> = failures.transport_errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].transport(), broken.id());
}

#[test]
fn failed_transport_abandons_messages_in_flight() {
    let broken = CapturingTransport::reliable(7, 24);
    broken.close();
    let cnx = connection(&broken);
    let mut scheduler = RoundRobinScheduler::new(None);
    scheduler
        .schedule(&cnx, tagged(1, b'L', 60), None, data())
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(2, b's', 4), None, data())
        .expect("queued");
    let failures = scheduler.flush(&cnx).expect_err("transport is closed");
    assert_eq!(failures.message_count(), 2);
    assert_eq!(scheduler.pending(), 0);
}

#[rstest]
fn sends_are_reported_to_the_listener(narrow: Arc<CapturingTransport>) {
    let cnx = connection(&narrow);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = RoundRobinScheduler::new(Some(tx));
    scheduler
        .schedule(&cnx, tagged(1, b'a', 4), None, data())
        .expect("queued");
    scheduler
        .schedule(&cnx, tagged(1, b'b', UNIT), None, data())
        .expect("queued");
    scheduler.flush(&cnx).expect("flushed");

    let first = rx.try_recv().expect("first packet reported");
    assert_eq!(first.transport, narrow.id());
    assert_eq!(first.messages, vec![tagged(1, b'a', 4)]);
    let second = rx.try_recv().expect("second packet reported");
    assert_eq!(second.messages, vec![tagged(1, b'b', UNIT)]);
    assert!(rx.try_recv().is_err());
}

#[rstest]
fn reset_discards_without_sending(narrow: Arc<CapturingTransport>) {
    let cnx = connection(&narrow);
    let mut scheduler = RoundRobinScheduler::new(None);
    scheduler
        .schedule(&cnx, tagged(1, b'a', 4), None, data())
        .expect("queued");
    scheduler.reset();
    assert_eq!(scheduler.pending(), 0);
    scheduler.flush(&cnx).expect("nothing to flush");
    assert!(narrow.sent().is_empty());
}
