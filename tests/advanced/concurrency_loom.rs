#![cfg(all(feature = "advanced-tests", loom))]
//! Concurrency tests for the segment pool using loom.
//!
//! A transport's receive path can allocate and drop packets while the tick
//! thread is flushing. `loom` explores those interleavings to check that the
//! live-block count and the idle buckets stay consistent.

use groupwire::packet::{Packet, PoolConfig, SegmentPool};
use loom::{model, thread};

fn small_pool() -> SegmentPool {
    SegmentPool::new(PoolConfig {
        min_segment_size: 16,
        max_segment_size: 64,
        reserved_head_room: 4,
        max_pooled_per_bucket: 1,
    })
    .expect("valid pool config")
}

#[test]
fn concurrent_allocations_return_to_the_pool() {
    model(|| {
        let pool = small_pool();
        let p1 = pool.clone();
        let p2 = pool.clone();

        let t1 = thread::spawn(move || drop(Packet::from_slice(&p1, b"first")));
        let t2 = thread::spawn(move || drop(Packet::from_slice(&p2, b"second")));

        t1.join().expect("first allocation thread panicked");
        t2.join().expect("second allocation thread panicked");

        let stats = pool.stats();
        assert_eq!(stats.live_blocks, 0);
        assert_eq!(stats.pooled_blocks, 1, "bucket keeps at most one idle block");
    });
}

#[test]
fn shared_segments_recycle_once() {
    model(|| {
        let pool = small_pool();
        let packet = Packet::from_slice(&pool, b"shared bytes");
        let copy = packet.copy().expect("live packet");

        let t1 = thread::spawn(move || drop(packet));
        let t2 = thread::spawn(move || {
            assert_eq!(copy.to_bytes().expect("live packet").as_ref(), b"shared bytes");
        });

        t1.join().expect("drop thread panicked");
        t2.join().expect("reader thread panicked");

        let stats = pool.stats();
        assert_eq!(stats.live_blocks, 0);
        assert_eq!(stats.pooled_blocks, 1);
    });
}
