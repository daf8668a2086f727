//! CLOCK (second chance) replacement policy.

use crate::buffer::frame::Frame;
use crate::common::{Error, FrameId, Result};

/// Clock eviction over the frame table.
///
/// A single hand sweeps the frames cyclically. Each step examines one frame:
/// - invalid: claim it immediately
/// - refbit set: clear the refbit (second chance), keep sweeping
/// - pinned: count it, keep sweeping
/// - otherwise: victim
///
/// # Termination
/// The pinned counter is reset every time the hand comes back around to the
/// position where the sweep began, so pinned frames met *before* a full lap
/// completes never declare exhaustion early - an evictable frame may still
/// sit later in the same lap. Only when a post-reset lap counts every frame
/// pinned does the sweep fail with [`Error::BufferExceeded`]. A frame whose
/// refbit was cleared on the first lap is a candidate on the second, so the
/// sweep visits each frame at most twice before settling.
///
/// The hand starts on the last slot, making slot 0 the first frame examined.
pub struct ClockReplacer {
    hand: usize,
}

impl ClockReplacer {
    /// Create a replacer for a pool of `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be non-zero");
        Self { hand: capacity - 1 }
    }

    fn advance(&mut self, capacity: usize) {
        self.hand = (self.hand + 1) % capacity;
    }

    /// Sweep for a claimable frame.
    ///
    /// The returned frame is either invalid or valid-unpinned-unreferenced;
    /// the caller is responsible for writing back a dirty victim and
    /// clearing its descriptor. The hand stays on the claimed frame.
    pub fn pick_victim(&mut self, frames: &[Frame]) -> Result<FrameId> {
        let capacity = frames.len();
        let start = self.hand;
        let mut num_pinned = 0;

        self.advance(capacity);
        while num_pinned < capacity {
            if self.hand == start {
                num_pinned = 0;
            }

            let frame = &frames[self.hand];
            if !frame.is_valid() {
                return Ok(FrameId::new(self.hand));
            }
            if frame.has_refbit() {
                frame.clear_refbit();
                self.advance(capacity);
                continue;
            }
            if frame.is_pinned() {
                num_pinned += 1;
                self.advance(capacity);
                continue;
            }
            return Ok(FrameId::new(self.hand));
        }

        Err(Error::BufferExceeded(capacity))
    }
}
