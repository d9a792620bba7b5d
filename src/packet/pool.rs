//! Size-classed block pool backing every [`Packet`](crate::packet::Packet).
//!
//! Blocks are handed out in power-of-two size classes between
//! [`PoolConfig::min_segment_size`] and [`PoolConfig::max_segment_size`].
//! When the last segment referring to a block is dropped the block returns to
//! its bucket, up to [`PoolConfig::max_pooled_per_bucket`] retained blocks.
//! Each bucket sits behind its own lock so receive callbacks and a flushing
//! tick can allocate and recycle concurrently.

#[cfg(not(loom))]
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::{
    fmt,
    mem,
    sync::{Arc, PoisonError, Weak},
};

#[cfg(loom)]
use loom::sync::Mutex;
#[cfg(loom)]
use loom::sync::atomic::{AtomicUsize, Ordering};
use log::trace;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

use super::{PoolConfigError, segment::Segment};

/// Default smallest block handed out by the pool.
pub const DEFAULT_MIN_SEGMENT_SIZE: usize = 1024;
/// Default largest block handed out by the pool.
pub const DEFAULT_MAX_SEGMENT_SIZE: usize = 64 * 1024;
/// Default head-room reserved in front of freshly allocated segments.
pub const DEFAULT_RESERVED_HEAD_ROOM: usize = 16;
const DEFAULT_MAX_POOLED_PER_BUCKET: usize = 32;

const_assert!(DEFAULT_MIN_SEGMENT_SIZE.is_power_of_two());
const_assert!(DEFAULT_MAX_SEGMENT_SIZE.is_power_of_two());
const_assert!(DEFAULT_RESERVED_HEAD_ROOM < DEFAULT_MIN_SEGMENT_SIZE);

/// Size classes and retention limits for a [`SegmentPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Smallest block size; must be a power of two.
    pub min_segment_size: usize,
    /// Largest block size; must be a power of two.
    pub max_segment_size: usize,
    /// Bytes left free in front of new segments so headers can be prepended
    /// without reallocating.
    pub reserved_head_room: usize,
    /// Number of idle blocks each bucket keeps for reuse.
    pub max_pooled_per_bucket: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_segment_size: DEFAULT_MIN_SEGMENT_SIZE,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            reserved_head_room: DEFAULT_RESERVED_HEAD_ROOM,
            max_pooled_per_bucket: DEFAULT_MAX_POOLED_PER_BUCKET,
        }
    }
}

impl PoolConfig {
    /// Check the size classes are usable.
    ///
    /// # Errors
    ///
    /// Returns [`PoolConfigError`] when a size is not a power of two, the
    /// bounds are inverted, or the head-room would fill a minimum-size block.
    pub fn validate(&self) -> Result<(), PoolConfigError> {
        for size in [self.min_segment_size, self.max_segment_size] {
            if !size.is_power_of_two() {
                return Err(PoolConfigError::NotPowerOfTwo(size));
            }
        }
        if self.min_segment_size > self.max_segment_size {
            return Err(PoolConfigError::InvertedBounds {
                min: self.min_segment_size,
                max: self.max_segment_size,
            });
        }
        if self.reserved_head_room >= self.min_segment_size {
            return Err(PoolConfigError::HeadRoomTooLarge {
                head_room: self.reserved_head_room,
                min: self.min_segment_size,
            });
        }
        Ok(())
    }

    fn bucket_count(&self) -> usize {
        (self.max_segment_size.trailing_zeros() - self.min_segment_size.trailing_zeros()) as usize
            + 1
    }

    fn bucket_for(&self, capacity: usize) -> usize {
        let size = capacity.max(self.min_segment_size).next_power_of_two();
        (size.trailing_zeros() - self.min_segment_size.trailing_zeros()) as usize
    }
}

/// Snapshot of pool occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Blocks currently referenced by at least one segment.
    pub live_blocks: usize,
    /// Idle blocks waiting in the buckets.
    pub pooled_blocks: usize,
}

pub(crate) struct PoolShared {
    config: PoolConfig,
    buckets: Vec<Mutex<Vec<Box<[u8]>>>>,
    live: AtomicUsize,
}

impl PoolShared {
    fn take(&self, bucket: usize) -> Box<[u8]> {
        let recycled = self.buckets[bucket]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        self.live.fetch_add(1, Ordering::AcqRel);
        recycled.unwrap_or_else(|| vec![0; self.config.min_segment_size << bucket].into_boxed_slice())
    }

    pub(crate) fn recycle(&self, bytes: Box<[u8]>) {
        self.live.fetch_sub(1, Ordering::AcqRel);
        let bucket = self.config.bucket_for(bytes.len());
        let Some(slot) = self.buckets.get(bucket) else {
            return;
        };
        let mut idle = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.config.max_pooled_per_bucket {
            idle.push(bytes);
        } else {
            trace!("bucket {bucket} full, dropping {}-byte block", bytes.len());
        }
    }
}

/// A byte block checked out of the pool; returns itself on drop.
pub(crate) struct Block {
    bytes: Box<[u8]>,
    home: Weak<PoolShared>,
}

impl Block {
    pub(crate) fn bytes(&self) -> &[u8] { &self.bytes }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] { &mut self.bytes }

    pub(crate) fn capacity(&self) -> usize { self.bytes.len() }
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Some(pool) = self.home.upgrade() {
            pool.recycle(mem::take(&mut self.bytes));
        }
    }
}

/// Explicitly constructed allocator shared by all packets of a pipeline.
///
/// Cloning the pool is cheap and yields another handle to the same buckets.
///
/// # Examples
///
/// ```
/// use groupwire::packet::{Packet, SegmentPool};
///
/// let pool = SegmentPool::default();
/// let packet = Packet::from_slice(&pool, b"hello");
/// assert_eq!(packet.len(), Ok(5));
/// ```
#[derive(Clone)]
pub struct SegmentPool {
    shared: Arc<PoolShared>,
}

impl SegmentPool {
    /// Build a pool with the given size classes.
    ///
    /// # Errors
    ///
    /// Returns [`PoolConfigError`] if `config` fails [`PoolConfig::validate`].
    pub fn new(config: PoolConfig) -> Result<Self, PoolConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: PoolConfig) -> Self {
        let buckets = (0..config.bucket_count())
            .map(|_| Mutex::new(Vec::new()))
            .collect();
        Self {
            shared: Arc::new(PoolShared {
                config,
                buckets,
                live: AtomicUsize::new(0),
            }),
        }
    }

    /// Size classes this pool was built with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig { &self.shared.config }

    /// Largest number of bytes a single segment can carry.
    #[must_use]
    pub fn max_segment_size(&self) -> usize { self.shared.config.max_segment_size }

    /// Current occupancy figures.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let pooled_blocks = self
            .shared
            .buckets
            .iter()
            .map(|bucket| bucket.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum();
        PoolStats {
            live_blocks: self.shared.live.load(Ordering::Acquire),
            pooled_blocks,
        }
    }

    /// Whether two handles refer to the same pool.
    #[must_use]
    pub fn same_pool(&self, other: &Self) -> bool { Arc::ptr_eq(&self.shared, &other.shared) }

    /// Check out a segment with `len` live bytes, leaving head-room in front
    /// when the size class allows it. `fill` initialises the live bytes.
    ///
    /// `len` is clamped to [`max_segment_size`](Self::max_segment_size).
    pub(crate) fn allocate(&self, len: usize, fill: impl FnOnce(&mut [u8])) -> Segment {
        let config = &self.shared.config;
        let len = len.min(config.max_segment_size);
        let head_room = config.reserved_head_room.min(config.max_segment_size - len);
        let bucket = config.bucket_for(len + head_room);
        let mut block = Block {
            bytes: self.shared.take(bucket),
            home: Arc::downgrade(&self.shared),
        };
        fill(&mut block.bytes_mut()[head_room..head_room + len]);
        Segment::new(block, head_room, len)
    }

    /// Copy `bytes` into as few fresh segments as the size classes permit.
    pub(crate) fn segments_from(&self, bytes: &[u8]) -> Vec<Segment> {
        bytes
            .chunks(self.max_segment_size())
            .map(|chunk| self.allocate(chunk.len(), |dst| dst.copy_from_slice(chunk)))
            .collect()
    }
}

impl Default for SegmentPool {
    fn default() -> Self { Self::with_valid_config(PoolConfig::default()) }
}

impl fmt::Debug for SegmentPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentPool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}
