//! Frame identifier type.

use std::fmt;

/// Index of a slot in the buffer pool's frame table.
///
/// The pool stores its frames in a `Vec` sized once at construction, so a
/// frame id is a plain `usize` slot index (`frames[frame_id.0]`). Unlike
/// [`PageId`](crate::common::PageId) there is no sentinel: frame ids never
/// appear on disk, and every id in circulation comes from the page table or
/// the clock sweep, both of which only name real slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Wrap a slot index.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_indexes_directly() {
        let slots = ["a", "b", "c"];
        let fid = FrameId::new(2);
        assert_eq!(slots[fid.0], "c");
    }

    #[test]
    fn test_frame_id_equality() {
        assert_eq!(FrameId::new(5), FrameId::new(5));
        assert_ne!(FrameId::new(5), FrameId::new(6));
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(format!("{}", FrameId::new(42)), "Frame(42)");
    }
}
