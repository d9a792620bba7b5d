//! Pooled, segmented, reference-counted byte buffers.
//!
//! A [`Packet`] is an ordered list of segments whose concatenation is the
//! packet's content. Segments are views into blocks checked out of a
//! [`SegmentPool`]; splitting and sub-setting share blocks instead of copying
//! bytes. A block shared by more than one segment is never written in place:
//! [`Packet::replace`] copies such segments first, and [`Packet::prepend`]
//! and [`Packet::append`] only grow into spare room of blocks they own
//! outright.

mod error;
mod pool;
mod segment;

use std::{fmt, mem};

use bytes::{BufMut, Bytes, BytesMut};
pub use error::{PacketError, PoolConfigError};
use log::trace;
pub use pool::{
    DEFAULT_MAX_SEGMENT_SIZE,
    DEFAULT_MIN_SEGMENT_SIZE,
    DEFAULT_RESERVED_HEAD_ROOM,
    PoolConfig,
    PoolStats,
    SegmentPool,
};
use segment::Segment;

type Result<T> = std::result::Result<T, PacketError>;

/// A wire-ready chunk of bytes backed by pooled segments.
///
/// Packets start with one reference. [`retain`](Self::retain) adds a
/// reference and [`release`](Self::release) removes one; releasing the last
/// reference returns the segments to the pool and every later call fails with
/// [`PacketError::Disposed`]. Dropping a packet also returns its segments.
///
/// # Examples
///
/// ```
/// use groupwire::packet::{Packet, SegmentPool};
///
/// let pool = SegmentPool::default();
/// let mut packet = Packet::from_slice(&pool, b"body");
/// packet.prepend(b"hdr:").expect("live packet");
/// let tail = packet.split_at(4).expect("in range");
/// assert_eq!(packet.to_bytes().expect("live packet").as_ref(), b"hdr:");
/// assert_eq!(tail.to_bytes().expect("live packet").as_ref(), b"body");
/// ```
pub struct Packet {
    pool: SegmentPool,
    segments: Vec<Segment>,
    len: usize,
    refs: usize,
}

impl Packet {
    /// Create an empty packet drawing from `pool`.
    #[must_use]
    pub fn new(pool: &SegmentPool) -> Self { Self::from_segments(pool.clone(), Vec::new(), 0) }

    /// Create a zero-filled packet of `len` bytes.
    #[must_use]
    pub fn with_len(pool: &SegmentPool, len: usize) -> Self {
        let mut packet = Self::new(pool);
        packet.extend_with(len, |_, dst| dst.fill(0));
        packet
    }

    /// Create a packet holding a copy of `bytes`.
    #[must_use]
    pub fn from_slice(pool: &SegmentPool, bytes: &[u8]) -> Self {
        Self::from_segments(pool.clone(), pool.segments_from(bytes), bytes.len())
    }

    fn from_segments(pool: SegmentPool, segments: Vec<Segment>, len: usize) -> Self {
        Self {
            pool,
            segments,
            len,
            refs: 1,
        }
    }

    fn live(&self) -> Result<()> {
        if self.refs == 0 {
            Err(PacketError::Disposed)
        } else {
            Ok(())
        }
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        self.live()?;
        if offset.checked_add(len).is_none_or(|end| end > self.len) {
            return Err(PacketError::OutOfRange {
                offset,
                len,
                available: self.len,
            });
        }
        Ok(())
    }

    /// Total number of bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] after the last reference is released.
    pub fn len(&self) -> Result<usize> {
        self.live()?;
        Ok(self.len)
    }

    /// Whether the packet holds no bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] after the last reference is released.
    pub fn is_empty(&self) -> Result<bool> { self.len().map(|len| len == 0) }

    /// Whether the last reference has been released.
    #[must_use]
    pub const fn is_disposed(&self) -> bool { self.refs == 0 }

    /// Outstanding explicit references.
    #[must_use]
    pub const fn ref_count(&self) -> usize { self.refs }

    /// Pool this packet allocates from.
    #[must_use]
    pub fn pool(&self) -> &SegmentPool { &self.pool }

    /// Number of segments currently backing the packet.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] after the last reference is released.
    pub fn segment_count(&self) -> Result<usize> {
        self.live()?;
        Ok(self.segments.len())
    }

    /// Iterate over the segment contents in order, for vectored writes.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] after the last reference is released.
    pub fn chunks(&self) -> Result<impl Iterator<Item = &[u8]>> {
        self.live()?;
        Ok(self.segments.iter().map(Segment::bytes))
    }

    /// Read the byte at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::OutOfRange`] if `offset` is not below the length,
    /// or [`PacketError::Disposed`] on a released packet.
    pub fn byte_at(&self, offset: usize) -> Result<u8> {
        self.check_range(offset, 1)?;
        let (index, inner) = self.locate(offset);
        Ok(self.segments[index].bytes()[inner])
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::OutOfRange`] if the range exceeds the packet,
    /// or [`PacketError::Disposed`] on a released packet.
    pub fn read_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.check_range(offset, dst.len())?;
        let (mut index, mut inner) = self.locate(offset);
        let mut done = 0;
        while done < dst.len() {
            let src = &self.segments[index].bytes()[inner..];
            let take = src.len().min(dst.len() - done);
            dst[done..done + take].copy_from_slice(&src[..take]);
            done += take;
            index += 1;
            inner = 0;
        }
        Ok(())
    }

    /// Contiguous copy of the packet's content.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] after the last reference is released.
    pub fn to_bytes(&self) -> Result<Bytes> {
        self.live()?;
        let mut out = BytesMut::with_capacity(self.len);
        for segment in &self.segments {
            out.put_slice(segment.bytes());
        }
        Ok(out.freeze())
    }

    /// Append a copy of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] after the last reference is released.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.live()?;
        self.extend_with(bytes.len(), |offset, dst| {
            dst.copy_from_slice(&bytes[offset..offset + dst.len()]);
        });
        Ok(())
    }

    /// Append the content of `other` by sharing its segments.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] if either packet has been released.
    pub fn append_packet(&mut self, other: &Packet) -> Result<()> {
        self.live()?;
        other.live()?;
        self.segments.extend(other.segments.iter().cloned());
        self.len += other.len;
        Ok(())
    }

    /// Insert a copy of `bytes` in front of the current content.
    ///
    /// Writes into the head-room of the first segment when that segment is
    /// not shared and has space, otherwise inserts fresh segments.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] after the last reference is released.
    pub fn prepend(&mut self, bytes: &[u8]) -> Result<()> {
        self.live()?;
        if bytes.is_empty() {
            return Ok(());
        }
        if let Some(dst) = self
            .segments
            .first_mut()
            .and_then(|first| first.extend_front(bytes.len()))
        {
            dst.copy_from_slice(bytes);
        } else {
            let fresh = self.pool.segments_from(bytes);
            self.segments.splice(0..0, fresh);
        }
        self.len += bytes.len();
        Ok(())
    }

    /// Overwrite `bytes.len()` bytes starting at `offset`.
    ///
    /// Shared segments are copied before being written, so other packets
    /// viewing the same blocks are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::OutOfRange`] if the range exceeds the packet,
    /// or [`PacketError::Disposed`] on a released packet.
    pub fn replace(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check_range(offset, bytes.len())?;
        let (mut index, mut inner) = self.locate(offset);
        let mut done = 0;
        while done < bytes.len() {
            let segment = &mut self.segments[index];
            let take = (segment.len() - inner).min(bytes.len() - done);
            if segment.live_mut().is_none() {
                trace!("copying shared {}-byte segment before write", segment.len());
                let private = self
                    .pool
                    .allocate(segment.len(), |dst| dst.copy_from_slice(segment.bytes()));
                *segment = private;
            }
            if let Some(dst) = segment.live_mut() {
                dst[inner..inner + take].copy_from_slice(&bytes[done..done + take]);
            }
            done += take;
            index += 1;
            inner = 0;
        }
        Ok(())
    }

    /// Remove `count` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::OutOfRange`] if the range exceeds the packet,
    /// or [`PacketError::Disposed`] on a released packet.
    pub fn remove(&mut self, offset: usize, count: usize) -> Result<()> {
        self.check_range(offset, count)?;
        let remaining = self.len - offset - count;
        let mut tail = self.detach_from(offset);
        trim_front(&mut tail, count);
        self.segments.append(&mut tail);
        self.len = offset + remaining;
        Ok(())
    }

    /// Split at `pos`: `self` keeps `[0, pos)` and the returned packet holds
    /// the rest. No bytes are copied.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::OutOfRange`] if `pos` exceeds the length,
    /// or [`PacketError::Disposed`] on a released packet.
    pub fn split_at(&mut self, pos: usize) -> Result<Packet> {
        self.check_range(pos, 0)?;
        let suffix_len = self.len - pos;
        let tail = self.detach_from(pos);
        Ok(Self::from_segments(self.pool.clone(), tail, suffix_len))
    }

    /// Split off the first `count` bytes: the returned packet holds them and
    /// `self` keeps the rest. No bytes are copied.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::OutOfRange`] if `count` exceeds the length,
    /// or [`PacketError::Disposed`] on a released packet.
    pub fn split_out(&mut self, count: usize) -> Result<Packet> {
        self.check_range(0, count)?;
        let suffix_len = self.len - count;
        let tail = self.detach_from(count);
        let prefix = mem::replace(&mut self.segments, tail);
        self.len = suffix_len;
        Ok(Self::from_segments(self.pool.clone(), prefix, count))
    }

    /// A new packet viewing `count` bytes from `offset`, sharing segments.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::OutOfRange`] if the range exceeds the packet,
    /// or [`PacketError::Disposed`] on a released packet.
    pub fn subset(&self, offset: usize, count: usize) -> Result<Packet> {
        self.check_range(offset, count)?;
        let mut segments = Vec::new();
        let (mut index, mut inner) = self.locate(offset);
        let mut done = 0;
        while done < count {
            let segment = &self.segments[index];
            let take = (segment.len() - inner).min(count - done);
            segments.push(segment.slice(inner, take));
            done += take;
            index += 1;
            inner = 0;
        }
        Ok(Self::from_segments(self.pool.clone(), segments, count))
    }

    /// A packet with the same content and its own reference count.
    ///
    /// Segments are shared; writes on either packet copy before mutating, so
    /// the two stay independent.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] after the last reference is released.
    pub fn copy(&self) -> Result<Packet> {
        self.live()?;
        Ok(Self::from_segments(
            self.pool.clone(),
            self.segments.clone(),
            self.len,
        ))
    }

    /// Rewrite the content into the fewest segments the pool's largest size
    /// class allows.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] after the last reference is released.
    pub fn consolidate(&mut self) -> Result<()> {
        let minimal = self.len.div_ceil(self.pool.max_segment_size());
        if self.segment_count()? <= minimal {
            return Ok(());
        }
        let content = self.to_bytes()?;
        self.segments = self.pool.segments_from(&content);
        Ok(())
    }

    /// Extend the packet with zeroes up to `new_len` bytes. Shorter lengths
    /// leave the packet unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] after the last reference is released.
    pub fn grow(&mut self, new_len: usize) -> Result<()> {
        self.live()?;
        if new_len > self.len {
            self.extend_with(new_len - self.len, |_, dst| dst.fill(0));
        }
        Ok(())
    }

    /// Add a reference. Returns `false` if the packet was already disposed.
    pub fn retain(&mut self) -> bool {
        if self.refs == 0 {
            return false;
        }
        self.refs += 1;
        true
    }

    /// Drop a reference, returning segments to the pool when none remain.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Disposed`] if no references remain.
    pub fn release(&mut self) -> Result<()> {
        self.live()?;
        self.refs -= 1;
        if self.refs == 0 {
            self.segments.clear();
            self.len = 0;
        }
        Ok(())
    }

    /// Segment index and offset inside it for byte `offset`. Offsets at the
    /// end map past the last segment.
    fn locate(&self, offset: usize) -> (usize, usize) {
        let mut start = 0;
        for (index, segment) in self.segments.iter().enumerate() {
            if offset < start + segment.len() {
                return (index, offset - start);
            }
            start += segment.len();
        }
        (self.segments.len(), 0)
    }

    /// Detach every byte from `pos` onwards, splitting a straddling segment.
    fn detach_from(&mut self, pos: usize) -> Vec<Segment> {
        let (index, inner) = self.locate(pos);
        let tail = if inner == 0 {
            self.segments.split_off(index)
        } else {
            let segment = &mut self.segments[index];
            let right = segment.slice(inner, segment.len() - inner);
            segment.truncate(inner);
            let mut tail = self.segments.split_off(index + 1);
            tail.insert(0, right);
            tail
        };
        self.len = pos;
        tail
    }

    /// Append `count` bytes produced by `write`, which receives the offset of
    /// each chunk within the appended range.
    fn extend_with(&mut self, count: usize, mut write: impl FnMut(usize, &mut [u8])) {
        let mut done = 0;
        if let Some(dst) = self
            .segments
            .last_mut()
            .and_then(|last| last.extend_back(count))
        {
            done = dst.len();
            write(0, dst);
        }
        while done < count {
            let chunk = (count - done).min(self.pool.max_segment_size());
            let segment = self.pool.allocate(chunk, |dst| write(done, dst));
            self.segments.push(segment);
            done += chunk;
        }
        self.len += count;
    }
}

fn trim_front(segments: &mut Vec<Segment>, mut count: usize) {
    let mut drop_whole = 0;
    for segment in segments.iter_mut() {
        if count == 0 {
            break;
        }
        if segment.len() <= count {
            count -= segment.len();
            drop_whole += 1;
        } else {
            segment.trim_front(count);
            count = 0;
        }
    }
    segments.drain(..drop_whole);
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.len)
            .field("refs", &self.refs)
            .field("segments", &self.segments)
            .finish()
    }
}
