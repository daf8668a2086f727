//! Record identifier type.

use std::fmt;

use crate::common::PageId;

/// Identifies a record in a base relation: the page it lives on plus its
/// slot number within that page.
///
/// # On-disk layout (8 bytes, little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     page_no (u32)
/// 4       2     slot (u16)
/// 6       2     reserved (zero)
/// ```
///
/// A record id with `page_no == 0` is the empty-slot sentinel inside index
/// leaf pages; see [`RecordId::is_null`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Page of the base relation holding the record.
    pub page_no: PageId,
    /// Slot within that page.
    pub slot: u16,
}

impl RecordId {
    /// Size of the on-disk encoding in bytes.
    pub const SIZE: usize = 8;

    /// Create a new RecordId.
    #[inline]
    pub fn new(page_no: PageId, slot: u16) -> Self {
        Self { page_no, slot }
    }

    /// The empty-slot sentinel (page 0, slot 0).
    pub const NULL: RecordId = RecordId {
        page_no: PageId::INVALID,
        slot: 0,
    };

    /// True if this is the empty-slot sentinel.
    #[inline]
    pub fn is_null(&self) -> bool {
        !self.page_no.is_valid()
    }

    /// Read a record id from the first `SIZE` bytes of `buf`.
    ///
    /// # Panics
    /// Panics if `buf.len() < RecordId::SIZE`.
    pub fn from_bytes(buf: &[u8]) -> Self {
        let page_no = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let slot = u16::from_le_bytes([buf[4], buf[5]]);
        Self {
            page_no: PageId::new(page_no),
            slot,
        }
    }

    /// Write the on-disk encoding into the first `SIZE` bytes of `buf`.
    ///
    /// # Panics
    /// Panics if `buf.len() < RecordId::SIZE`.
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_no.0.to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot.to_le_bytes());
        buf[6..8].fill(0);
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page_no.0, self.slot)
    }
}
