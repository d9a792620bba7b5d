//! Behaviour of the recording transport and wire splitting helpers.

use bytes::Bytes;
use groupwire::{
    packet::{Packet, SegmentPool},
    transport::{Transport, TransportError, TransportId},
};
use groupwire_testing::{RecordingTransport, split_units};

#[test]
fn recording_transport_keeps_packets_in_order() {
    let pool = SegmentPool::default();
    let transport = RecordingTransport::reliable(4, 64);
    transport.send(Packet::from_slice(&pool, b"one")).expect("accepted");
    transport.send(Packet::from_slice(&pool, b"two")).expect("accepted");
    assert_eq!(transport.sent(), vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
    assert_eq!(transport.take_sent().len(), 2);
    assert!(transport.sent().is_empty());
}

#[test]
fn injected_failures_start_after_the_budget() {
    let pool = SegmentPool::default();
    let transport = RecordingTransport::unreliable(2, 64);
    transport.fail_after(1);
    assert!(transport.send(Packet::from_slice(&pool, b"ok")).is_ok());
    assert!(matches!(
        transport.send(Packet::from_slice(&pool, b"no")),
        Err(TransportError::Failed { transport, .. }) if transport == TransportId::new(2)
    ));
}

#[test]
fn oversized_packets_are_refused() {
    let pool = SegmentPool::default();
    let transport = RecordingTransport::reliable(1, 4);
    assert!(matches!(
        transport.send(Packet::from_slice(&pool, b"too long")),
        Err(TransportError::PacketTooLarge { size: 8, limit: 4, .. })
    ));
}

#[test]
fn units_are_split_on_headers() {
    let packet = Bytes::from_static(&[3, 1, 0, 0, 0, 2, b'h', b'i', 0x81, 2, 0, 0, 0, 3, 0x00, 0x02, 9]);
    let units = split_units(&packet);
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].payload().as_ref(), b"hi");
    assert!(units[1].is_fragment());
    assert_eq!(units[1].channel, 2);
    assert_eq!(units[1].payload().as_ref(), [9]);
}
