//! `ImmediateScheduler` sends on schedule and ignores flushes.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{StubConnection, tagged, tags};
use crate::{
    qos::ChannelRequirements,
    scheduler::{ImmediateScheduler, PacketScheduler, SendError},
    test_support::CapturingTransport,
    transport::Transport,
};

#[test]
fn each_packet_is_sent_on_its_own() {
    let transport = CapturingTransport::reliable(1, 1024);
    let cnx = StubConnection::new(vec![transport.clone() as Arc<dyn Transport>]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = ImmediateScheduler::new(Some(tx));
    for tag in *b"ab" {
        scheduler
            .schedule(&cnx, tagged(1, tag, 4), None, ChannelRequirements::data())
            .expect("sent");
    }
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(tags(&sent), b"ab");
    assert_eq!(rx.try_recv().expect("reported").messages, vec![tagged(1, b'a', 4)]);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn fragmented_messages_send_every_fragment() {
    let transport = CapturingTransport::reliable(1, 20);
    let cnx = StubConnection::new(vec![transport.clone() as Arc<dyn Transport>]);
    let mut scheduler = ImmediateScheduler::new(None);
    scheduler
        .schedule(&cnx, tagged(1, b'x', 40), None, ChannelRequirements::data())
        .expect("sent");
    assert_eq!(transport.sent().len(), 5);
    scheduler.flush(&cnx).expect("no-op");
    assert_eq!(transport.sent().len(), 5);
}

#[test]
fn failures_carry_the_message() {
    let cnx = StubConnection::new(Vec::new());
    let mut scheduler = ImmediateScheduler::new(None);
    let failures = scheduler
        .schedule(&cnx, tagged(3, b'q', 1), None, ChannelRequirements::data())
        .expect_err("no transports");
    let (error, messages) = &failures.failures()[0];
    assert!(matches!(error, SendError::NoMatchingTransport(_)));
    assert_eq!(messages[0].message, tagged(3, b'q', 1));
}

#[test]
fn closed_transports_report_transport_errors() {
    let transport = CapturingTransport::reliable(4, 1024);
    transport.close();
    let cnx = StubConnection::new(vec![transport.clone() as Arc<dyn Transport>]);
    let mut scheduler = ImmediateScheduler::new(None);
    let failures = scheduler
        .schedule(&cnx, tagged(3, b'q', 1), None, ChannelRequirements::data())
        .expect_err("closed");
    assert_eq!(
        failures.transport_errors().map(|e| e.transport()).collect::<Vec<_>>(),
        vec![transport.id()]
    );
}
