//! A live byte range inside a shared pool block.
//!
//! The block handle's strong count is the segment owner count: cloning a
//! segment shares the block, and mutation is only possible while the handle
//! is unique.

use std::{fmt, sync::Arc};

use super::pool::Block;

#[derive(Clone)]
pub(crate) struct Segment {
    block: Arc<Block>,
    start: usize,
    len: usize,
}

impl Segment {
    pub(crate) fn new(block: Block, start: usize, len: usize) -> Self {
        Self {
            block: Arc::new(block),
            start,
            len,
        }
    }

    pub(crate) fn len(&self) -> usize { self.len }

    pub(crate) fn bytes(&self) -> &[u8] { &self.block.bytes()[self.start..self.start + self.len] }

    pub(crate) fn ref_count(&self) -> usize { Arc::strong_count(&self.block) }

    pub(crate) fn head_room(&self) -> usize { self.start }

    pub(crate) fn tail_room(&self) -> usize { self.block.capacity() - self.start - self.len }

    /// A view over `len` bytes starting `offset` bytes into this segment.
    pub(crate) fn slice(&self, offset: usize, len: usize) -> Self {
        debug_assert!(offset + len <= self.len, "slice exceeds segment");
        Self {
            block: Arc::clone(&self.block),
            start: self.start + offset,
            len,
        }
    }

    /// Drop `count` bytes from the front of the live range.
    pub(crate) fn trim_front(&mut self, count: usize) {
        debug_assert!(count <= self.len, "trim exceeds segment");
        self.start += count;
        self.len -= count;
    }

    /// Keep only the first `len` bytes of the live range.
    pub(crate) fn truncate(&mut self, len: usize) { self.len = self.len.min(len); }

    /// Overwrite live bytes in place. Returns `None` when the block is shared.
    pub(crate) fn live_mut(&mut self) -> Option<&mut [u8]> {
        let (start, len) = (self.start, self.len);
        Arc::get_mut(&mut self.block).map(|block| &mut block.bytes_mut()[start..start + len])
    }

    /// Extend the live range backwards into head-room, returning the newly
    /// exposed bytes. Returns `None` when the block is shared or the
    /// head-room is too small.
    pub(crate) fn extend_front(&mut self, count: usize) -> Option<&mut [u8]> {
        if count > self.start {
            return None;
        }
        let start = self.start - count;
        let block = Arc::get_mut(&mut self.block)?;
        self.start = start;
        self.len += count;
        Some(&mut block.bytes_mut()[start..start + count])
    }

    /// Extend the live range forwards into tail-room by up to `count` bytes,
    /// returning the newly exposed bytes. Returns `None` when the block is
    /// shared or has no tail-room.
    pub(crate) fn extend_back(&mut self, count: usize) -> Option<&mut [u8]> {
        let grow = count.min(self.tail_room());
        if grow == 0 {
            return None;
        }
        let end = self.start + self.len;
        let block = Arc::get_mut(&mut self.block)?;
        self.len += grow;
        Some(&mut block.bytes_mut()[end..end + grow])
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("capacity", &self.block.capacity())
            .field("refs", &self.ref_count())
            .finish()
    }
}
