#![cfg(not(loom))]
//! Scheduling behaviour observed on the wire through `PeerConnection`.

use bytes::Bytes;
use groupwire::{
    connection::PeerConnection,
    message::{ChannelId, Message},
    qos::{
        Aggregation,
        ChannelRequirements,
        Freshness,
        MessageRequirements,
        Ordering,
        Reliability,
    },
    transport::TransportId,
};
use groupwire_testing::{RecordingTransport, WireUnit, split_units};
use rstest::{fixture, rstest};

const UNIT: usize = 16;

fn tagged(channel: u8, tag: u8, len: usize) -> Message {
    Message::binary(ChannelId::new(channel), vec![tag; len])
}

/// First payload byte of every unit across `packets`, in wire order.
fn tags(packets: &[Bytes]) -> String {
    packets
        .iter()
        .flat_map(split_units)
        .map(|unit| char::from(unit.payload()[0]))
        .collect()
}

fn held() -> Option<MessageRequirements> {
    Some(MessageRequirements::new(
        Reliability::Reliable,
        Ordering::Ordered,
        Aggregation::Aggregatable,
    ))
}

#[fixture]
fn connection() -> PeerConnection { PeerConnection::builder().build().expect("valid defaults") }

#[rstest]
#[case::roomy(1024, 1)]
#[case::one_per_packet(UNIT + 6, 3)]
fn flush_channel_sends_earlier_messages_first(
    connection: PeerConnection,
    #[case] max_packet_size: usize,
    #[case] packets: usize,
) {
    let transport = RecordingTransport::reliable(1, max_packet_size);
    connection.add_transport(transport.clone());
    let chat = ChannelRequirements::new(
        Reliability::Reliable,
        Ordering::Ordered,
        Aggregation::FlushChannel,
    );
    for tag in [b'A', b'B'] {
        connection
            .send(tagged(5, tag, UNIT), held(), chat)
            .expect("queued");
    }
    assert!(transport.sent().is_empty());
    connection.send(tagged(5, b'C', UNIT), None, chat).expect("flushed");

    let sent = transport.sent();
    assert_eq!(sent.len(), packets);
    assert_eq!(tags(&sent), "ABC");
    let units: Vec<WireUnit> = sent.iter().flat_map(split_units).collect();
    assert!(units.iter().all(|u| u.channel == 5 && !u.is_fragment()));
}

#[rstest]
fn a_single_message_does_not_wait_for_a_backlog(connection: PeerConnection) {
    let transport = RecordingTransport::reliable(1, UNIT + 6);
    connection.add_transport(transport.clone());
    let data = ChannelRequirements::data();
    for tag in b"abcdef" {
        connection.send(tagged(1, *tag, UNIT), None, data).expect("queued");
    }
    connection.send(tagged(2, b'X', UNIT), None, data).expect("queued");
    connection.flush().expect("flushed");

    let order = tags(&transport.sent());
    let x = order.find('X').expect("sent");
    assert!(x < order.find('f').expect("sent"), "order was {order}");
}

#[rstest]
fn latest_only_channels_send_the_newest_value(connection: PeerConnection) {
    let transport = RecordingTransport::reliable(1, 1024);
    connection.add_transport(transport.clone());
    let pointer = ChannelRequirements::awareness_like();
    assert_eq!(pointer.freshness, Freshness::IncludeLatestOnly);
    for tag in [b'1', b'2', b'3'] {
        connection.send(tagged(7, tag, 4), None, pointer).expect("queued");
    }
    assert_eq!(connection.pending(), 1);
    connection.flush().expect("flushed");
    assert_eq!(tags(&transport.sent()), "3");
}

#[rstest]
fn requirements_route_to_matching_transports(connection: PeerConnection) {
    let cheap = RecordingTransport::unreliable(1, 1024);
    let safe = RecordingTransport::reliable(2, 1024);
    connection.add_transport(safe.clone());
    connection.add_transport(cheap.clone());

    connection
        .send(tagged(1, b'u', 4), None, ChannelRequirements::least_strict())
        .expect("queued");
    connection
        .send(tagged(2, b'r', 4), None, ChannelRequirements::data())
        .expect("queued");
    let pinned = MessageRequirements::specific(TransportId::new(2));
    connection
        .send(tagged(1, b'p', 4), Some(pinned), ChannelRequirements::least_strict())
        .expect("sent immediately");
    connection.flush().expect("flushed");

    assert_eq!(tags(&cheap.sent()), "u");
    let reliable = tags(&safe.sent());
    assert_eq!(reliable.len(), 2);
    assert!(reliable.contains('r') && reliable.contains('p'));
}

#[rstest]
fn a_failed_transport_is_dropped_and_traffic_moves_on(connection: PeerConnection) {
    let flaky = RecordingTransport::reliable(1, 1024);
    let backup = RecordingTransport::reliable(2, 1024);
    flaky.fail_after(0);
    connection.add_transport(flaky.clone());
    connection.add_transport(backup.clone());
    let cdr = ChannelRequirements::most_strict();

    let failures = connection
        .send(tagged(1, b'a', 4), None, cdr)
        .expect_err("first transport fails");
    assert_eq!(failures.message_count(), 1);
    assert_eq!(
        connection
            .transports()
            .iter()
            .map(|t| t.id())
            .collect::<Vec<_>>(),
        vec![TransportId::new(2)]
    );

    connection.send(tagged(1, b'b', 4), None, cdr).expect("sent");
    assert_eq!(tags(&backup.sent()), "b");
    assert!(flaky.sent().is_empty());
}
