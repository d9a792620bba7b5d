//! Sliding window over the sequence-number space.
//!
//! The window tracks the last `window_size` sequence numbers allocated by the
//! remote sender. A frame inside the window is *active*; a frame in the
//! `window_size` numbers after the newest is *expected* and, when seen,
//! slides the window forward. Frames pushed out of the window are expired
//! through a callback so their reassembly state can be released.

/// Window of outstanding frames over a circular numbering of `capacity`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlidingWindow {
    capacity: u32,
    window_size: u32,
    next: u32,
    allocated: u32,
}

impl SlidingWindow {
    /// Create an empty window. Returns `None` unless
    /// `0 < window_size < capacity`.
    #[must_use]
    pub const fn new(capacity: u32, window_size: u32) -> Option<Self> {
        if window_size == 0 || window_size >= capacity {
            return None;
        }
        Some(Self {
            capacity,
            window_size,
            next: 0,
            allocated: 0,
        })
    }

    /// Number of frames currently inside the window.
    #[must_use]
    pub const fn allocated(&self) -> u32 { self.allocated }

    #[must_use]
    pub const fn window_size(&self) -> u32 { self.window_size }

    /// Oldest frame still inside the window.
    #[must_use]
    pub const fn first_outstanding(&self) -> u32 {
        if self.next >= self.allocated {
            self.next - self.allocated
        } else {
            self.capacity - (self.allocated - self.next)
        }
    }

    /// Whether `frame` lies inside the window.
    #[must_use]
    pub const fn is_active(&self, frame: u32) -> bool {
        if self.allocated == 0 {
            false
        } else if self.next >= self.allocated {
            frame >= self.next - self.allocated && frame < self.next
        } else {
            frame < self.next || frame >= self.capacity - (self.allocated - self.next)
        }
    }

    /// Whether `frame` lies in the `window_size` numbers after the newest.
    #[must_use]
    pub const fn is_expected(&self, frame: u32) -> bool {
        if self.next + self.window_size < self.capacity {
            frame >= self.next && frame < self.next + self.window_size
        } else {
            frame >= self.next || frame < self.window_size - (self.capacity - self.next)
        }
    }

    /// Record that `frame` arrived.
    ///
    /// Returns `false` when the frame is neither active nor expected; such
    /// frames are stale or too far ahead and must be ignored. An expected
    /// frame slides the window so that it becomes the newest, calling
    /// `on_expired` for each frame pushed out, oldest first. The first frame
    /// ever seen is always accepted.
    pub fn seen(&mut self, frame: u32, mut on_expired: impl FnMut(u32)) -> bool {
        if frame >= self.capacity {
            return false;
        }
        if self.is_active(frame) {
            return true;
        }
        if self.allocated > 0 && !self.is_expected(frame) {
            return false;
        }

        let shift = if self.allocated > 0 {
            (frame + self.capacity - self.next) % self.capacity + 1
        } else {
            1
        };
        let old_first = self.first_outstanding();
        let vacant = self.window_size - self.allocated;
        let expired = shift.saturating_sub(vacant);

        self.allocated = self.window_size.min(self.allocated + shift);
        self.next = (frame + 1) % self.capacity;

        if expired > 0 {
            let mut frame = old_first;
            for _ in 0..expired {
                on_expired(frame);
                frame = (frame + 1) % self.capacity;
            }
        }
        true
    }

    /// Forget every frame.
    pub fn reset(&mut self) {
        self.next = 0;
        self.allocated = 0;
    }
}
