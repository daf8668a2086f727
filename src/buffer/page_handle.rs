//! Borrowed access to a pinned page.

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::buf_mgr::BufMgr;
use crate::common::{FrameId, PageId};
use crate::storage::page::Page;

/// A view of a pinned page in the buffer pool.
///
/// The handle is a borrow token, not an RAII guard: dropping it does **not**
/// unpin the page. Callers pair every `read_page`/`alloc_page` with an
/// explicit [`BufMgr::unpin_page`], which is where unmatched unpins surface
/// as typed errors. This also lets a pin outlive any one scope - the index
/// keeps its root pinned across a whole insert and its scan cursor pinned
/// across `scan_next` calls.
///
/// The page data is only meaningful while the pin is held; after the
/// matching unpin the frame may be evicted and reused at any time.
pub struct PageHandle<'a> {
    mgr: &'a BufMgr,
    frame_id: FrameId,
    page_no: PageId,
}

impl<'a> PageHandle<'a> {
    pub(crate) fn new(mgr: &'a BufMgr, frame_id: FrameId, page_no: PageId) -> Self {
        Self {
            mgr,
            frame_id,
            page_no,
        }
    }

    /// The page id this handle refers to.
    #[inline]
    pub fn page_no(&self) -> PageId {
        self.page_no
    }

    /// The frame holding the page.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Lock the page bytes for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.mgr.frame(self.frame_id).page()
    }

    /// Lock the page bytes for writing.
    ///
    /// Writing through the handle does not mark the frame dirty; the caller
    /// states dirtiness at unpin time.
    pub fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.mgr.frame(self.frame_id).page_mut()
    }
}
