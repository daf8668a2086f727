//! A frame in the buffer pool.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::{FileRef, Page};

/// A slot in the buffer pool: one page of data plus its descriptor.
///
/// # States
/// A frame is *valid* iff it has an owner `(file, page)`. An invalid frame
/// is unpinned, clean, and has no page-table entry.
///
/// # Synchronization
/// - `page`: RwLock - many readers or one writer of the page bytes
/// - `owner`: Mutex - identity of the cached page
/// - `pin_count`, `dirty`, `refbit`: atomics, Relaxed ordering (single-actor
///   contract; atomics keep the type `Sync` without wider locks)
pub struct Frame {
    /// The page data.
    page: RwLock<Page>,

    /// Which page of which file this frame holds. `None` = invalid frame.
    owner: Mutex<Option<(FileRef, PageId)>>,

    /// Number of active pins. Non-zero prevents eviction.
    pin_count: AtomicU32,

    /// True if the page was modified since it was read in.
    dirty: AtomicBool,

    /// Clock-algorithm recency flag: set on access, cleared by a passing
    /// eviction sweep.
    refbit: AtomicBool,
}

impl Frame {
    /// Create an empty (invalid) frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            owner: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
            refbit: AtomicBool::new(false),
        }
    }

    /// Lock the page bytes for reading.
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Lock the page bytes for writing.
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// The `(file, page)` this frame holds, if valid.
    pub fn owner(&self) -> Option<(FileRef, PageId)> {
        self.owner
            .lock()
            .as_ref()
            .map(|(f, p)| (FileRef::clone(f), *p))
    }

    /// True if the frame holds a page.
    pub fn is_valid(&self) -> bool {
        self.owner.lock().is_some()
    }

    /// Initialize the descriptor for a newly cached page:
    /// pinned once, recently referenced, clean.
    pub fn set_up(&self, file: FileRef, page_no: PageId) {
        *self.owner.lock() = Some((file, page_no));
        self.pin_count.store(1, Ordering::Relaxed);
        self.refbit.store(true, Ordering::Relaxed);
        self.dirty.store(false, Ordering::Relaxed);
    }

    /// Return the frame to the invalid state.
    pub fn clear(&self) {
        *self.owner.lock() = None;
        self.pin_count.store(0, Ordering::Relaxed);
        self.dirty.store(false, Ordering::Relaxed);
        self.refbit.store(false, Ordering::Relaxed);
    }

    /// Increment the pin count.
    pub fn pin(&self) {
        self.pin_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the pin count.
    ///
    /// Callers check for a zero count first; the debug assert is a backstop
    /// against unmatched unpins slipping through.
    pub fn unpin(&self) {
        let prev = self.pin_count.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "unpin with pin_count already 0");
    }

    /// Current pin count.
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    /// True if any pins are outstanding.
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Mark the page as modified.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// Mark the page as clean (after a write-back).
    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Relaxed);
    }

    /// True if the page has unwritten modifications.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    /// Set the recency flag (page was accessed).
    pub fn set_refbit(&self) {
        self.refbit.store(true, Ordering::Relaxed);
    }

    /// Clear the recency flag (eviction sweep passed by).
    pub fn clear_refbit(&self) {
        self.refbit.store(false, Ordering::Relaxed);
    }

    /// Current recency flag.
    pub fn has_refbit(&self) -> bool {
        self.refbit.load(Ordering::Relaxed)
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
