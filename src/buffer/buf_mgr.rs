//! The buffer manager: a fixed pool of page frames with clock eviction.

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use parking_lot::{Mutex, RwLock};

use crate::buffer::frame::Frame;
use crate::buffer::page_handle::PageHandle;
use crate::buffer::replacer::ClockReplacer;
use crate::buffer::stats::BufferStats;
use crate::common::{Error, FileId, FrameId, PageId, Result};
use crate::storage::FileRef;

/// Page table key: pages are cached per file.
type PageKey = (FileId, PageId);

/// The buffer manager.
///
/// Owns a fixed array of [`Frame`]s, a hash index from `(file, page)` to
/// frame, and the clock replacer. All page traffic between callers and files
/// goes through here: callers pin pages to use them, unpin them (stating
/// dirtiness) when done, and the clock sweep reclaims unpinned frames on
/// demand, writing dirty victims back to their owning files.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use burrowdb::{BufMgr, DiskFile, FileRef};
///
/// let pool = BufMgr::new(64);
/// let file: FileRef = Arc::new(DiskFile::create("rel.db").unwrap());
///
/// let (page_no, handle) = pool.alloc_page(&file).unwrap();
/// handle.write().as_mut_slice()[0] = 7;
/// pool.unpin_page(&file, page_no, true).unwrap();
/// ```
pub struct BufMgr {
    /// The pool. Frame `i` is pool slot `i`, fixed for the pool's lifetime.
    frames: Vec<Frame>,

    /// Maps resident `(file, page)` pairs to their frame. An entry exists
    /// exactly for each valid frame.
    page_table: RwLock<HashMap<PageKey, FrameId>>,

    /// Eviction policy.
    replacer: Mutex<ClockReplacer>,

    /// Performance counters.
    stats: BufferStats,
}

impl BufMgr {
    /// Create a pool of `capacity` frames, all initially invalid.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be non-zero");
        Self {
            frames: (0..capacity).map(|_| Frame::new()).collect(),
            page_table: RwLock::new(HashMap::new()),
            replacer: Mutex::new(ClockReplacer::new(capacity)),
            stats: BufferStats::new(),
        }
    }

    /// Number of frames in the pool.
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Performance counters.
    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    pub(crate) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.0]
    }

    /// Pin a page, reading it from `file` if it is not already resident.
    ///
    /// On a hit the frame's refbit is set and its pin count incremented. On
    /// a miss the page is read from the file *first* (an I/O fault fails the
    /// call without disturbing the pool), then a frame is claimed - evicting
    /// a victim if necessary - and the mapping inserted.
    ///
    /// Every successful call must be matched by one [`BufMgr::unpin_page`].
    pub fn read_page(&self, file: &FileRef, page_no: PageId) -> Result<PageHandle<'_>> {
        let key = (file.file_id(), page_no);

        {
            let table = self.page_table.read();
            if let Some(&frame_id) = table.get(&key) {
                let frame = &self.frames[frame_id.0];
                frame.set_refbit();
                frame.pin();
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(PageHandle::new(self, frame_id, page_no));
            }
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let data = file.read_page(page_no)?;
        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        let mut table = self.page_table.write();
        let frame_id = self.claim_frame(&mut table)?;
        let frame = &self.frames[frame_id.0];
        *frame.page_mut() = data;
        table.insert(key, frame_id);
        frame.set_up(FileRef::clone(file), page_no);
        Ok(PageHandle::new(self, frame_id, page_no))
    }

    /// Drop one pin from a resident page, marking it dirty if requested.
    ///
    /// Fails with [`Error::PageNotResident`] if the page is not cached and
    /// [`Error::PageNotPinned`] if its pin count is already zero.
    pub fn unpin_page(&self, file: &FileRef, page_no: PageId, dirty: bool) -> Result<()> {
        let key = (file.file_id(), page_no);
        let table = self.page_table.read();
        let &frame_id = table.get(&key).ok_or_else(|| Error::PageNotResident {
            file: file.filename().to_string(),
            page: page_no,
        })?;

        let frame = &self.frames[frame_id.0];
        if !frame.is_pinned() {
            return Err(Error::PageNotPinned {
                file: file.filename().to_string(),
                page: page_no,
            });
        }
        if dirty {
            frame.mark_dirty();
        }
        frame.unpin();
        Ok(())
    }

    /// Allocate a fresh page in `file` and pin it in a zeroed frame.
    pub fn alloc_page(&self, file: &FileRef) -> Result<(PageId, PageHandle<'_>)> {
        let page_no = file.allocate_page()?;

        let mut table = self.page_table.write();
        let frame_id = self.claim_frame(&mut table)?;
        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        table.insert((file.file_id(), page_no), frame_id);
        frame.set_up(FileRef::clone(file), page_no);
        Ok((page_no, PageHandle::new(self, frame_id, page_no)))
    }

    /// Drop a resident page from the pool and delete it from its file.
    ///
    /// Fails with [`Error::PageNotResident`] if the page is not cached.
    pub fn dispose_page(&self, file: &FileRef, page_no: PageId) -> Result<()> {
        let key = (file.file_id(), page_no);
        {
            let mut table = self.page_table.write();
            let frame_id = table.remove(&key).ok_or_else(|| Error::PageNotResident {
                file: file.filename().to_string(),
                page: page_no,
            })?;
            self.frames[frame_id.0].clear();
        }
        file.delete_page(page_no)
    }

    /// Write back and drop every resident page of `file`.
    ///
    /// Fails with [`Error::PagePinned`] on the first frame of the file that
    /// is still pinned; frames already processed stay flushed.
    pub fn flush_file(&self, file: &FileRef) -> Result<()> {
        let mut table = self.page_table.write();

        for frame in &self.frames {
            let Some((owning_file, page_no)) = frame.owner() else {
                continue;
            };
            if owning_file.file_id() != file.file_id() {
                continue;
            }
            if frame.is_pinned() {
                return Err(Error::PagePinned {
                    file: file.filename().to_string(),
                    page: page_no,
                });
            }
            if frame.is_dirty() {
                owning_file.write_page(page_no, &frame.page())?;
                frame.clear_dirty();
                self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
            }
            table.remove(&(owning_file.file_id(), page_no));
            frame.clear();
        }
        Ok(())
    }

    /// Diagnostic dump of every frame's descriptor.
    pub fn print_self(&self) {
        let mut valid_frames = 0;
        println!("=== buffer pool ({} frames) ===", self.frames.len());
        for (i, frame) in self.frames.iter().enumerate() {
            match frame.owner() {
                Some((file, page_no)) => {
                    valid_frames += 1;
                    println!(
                        "frame {}: file '{}' {}, pinCnt {}, dirty {}, refbit {}",
                        i,
                        file.filename(),
                        page_no,
                        frame.pin_count(),
                        frame.is_dirty(),
                        frame.has_refbit()
                    );
                }
                None => println!("frame {}: invalid", i),
            }
        }
        println!("total valid frames: {}", valid_frames);
    }

    /// Claim a frame via the clock sweep, cleaning up the victim.
    ///
    /// Called with the page table locked for writing so eviction and the
    /// mapping update are one atomic step from any observer's view.
    fn claim_frame(&self, table: &mut HashMap<PageKey, FrameId>) -> Result<FrameId> {
        let frame_id = self.replacer.lock().pick_victim(&self.frames)?;
        let frame = &self.frames[frame_id.0];

        if let Some((victim_file, victim_page)) = frame.owner() {
            if frame.is_dirty() {
                victim_file.write_page(victim_page, &frame.page())?;
                self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
            }
            table.remove(&(victim_file.file_id(), victim_page));
            frame.clear();
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(frame_id)
    }
}

impl Drop for BufMgr {
    /// Best-effort write-back of dirty frames. Errors are swallowed; a
    /// caller that needs to observe flush failures uses
    /// [`BufMgr::flush_file`] before dropping the pool.
    fn drop(&mut self) {
        for frame in &self.frames {
            if let Some((file, page_no)) = frame.owner() {
                if frame.is_dirty() {
                    let _ = file.write_page(page_no, &frame.page());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::test_util::MemFile;
    use std::sync::Arc;

    fn mem_file(name: &str) -> (FileRef, Arc<MemFile>) {
        let file = Arc::new(MemFile::new(name));
        (Arc::clone(&file) as FileRef, file)
    }

    fn alloc_unpinned(pool: &BufMgr, file: &FileRef, n: usize) -> Vec<PageId> {
        (0..n)
            .map(|_| {
                let (pid, _) = pool.alloc_page(file).unwrap();
                pool.unpin_page(file, pid, false).unwrap();
                pid
            })
            .collect()
    }

    #[test]
    fn test_alloc_and_read_back() {
        let pool = BufMgr::new(4);
        let (file, _) = mem_file("t");

        let (pid, handle) = pool.alloc_page(&file).unwrap();
        handle.write().as_mut_slice()[0] = 0xAA;
        pool.unpin_page(&file, pid, true).unwrap();

        let handle = pool.read_page(&file, pid).unwrap();
        assert_eq!(handle.read().as_slice()[0], 0xAA);
        pool.unpin_page(&file, pid, false).unwrap();
    }

    #[test]
    fn test_hit_does_not_touch_disk() {
        let pool = BufMgr::new(4);
        let (file, _) = mem_file("t");
        let pids = alloc_unpinned(&pool, &file, 1);

        let before = pool.stats().snapshot();
        let _h = pool.read_page(&file, pids[0]).unwrap();
        let after = pool.stats().snapshot();

        assert_eq!(after.cache_hits, before.cache_hits + 1);
        assert_eq!(after.pages_read, before.pages_read);
        pool.unpin_page(&file, pids[0], false).unwrap();
    }

    #[test]
    fn test_at_most_one_frame_per_page() {
        let pool = BufMgr::new(4);
        let (file, _) = mem_file("t");
        let pids = alloc_unpinned(&pool, &file, 1);

        let a = pool.read_page(&file, pids[0]).unwrap();
        let b = pool.read_page(&file, pids[0]).unwrap();
        assert_eq!(a.frame_id(), b.frame_id());
        assert_eq!(pool.frame(a.frame_id()).pin_count(), 2);

        pool.unpin_page(&file, pids[0], false).unwrap();
        pool.unpin_page(&file, pids[0], false).unwrap();
    }

    #[test]
    fn test_dirty_page_written_back_on_eviction() {
        let pool = BufMgr::new(2);
        let (file, _) = mem_file("t");

        let (pid, handle) = pool.alloc_page(&file).unwrap();
        handle.write().as_mut_slice()[7] = 0x77;
        pool.unpin_page(&file, pid, true).unwrap();

        // Fill the pool past capacity so pid gets evicted.
        alloc_unpinned(&pool, &file, 3);

        // Reading it back must see the written byte.
        let handle = pool.read_page(&file, pid).unwrap();
        assert_eq!(handle.read().as_slice()[7], 0x77);
        pool.unpin_page(&file, pid, false).unwrap();
        assert!(pool.stats().snapshot().evictions >= 1);
    }

    #[test]
    fn test_pinned_pages_never_evicted() {
        let pool = BufMgr::new(3);
        let (file, _) = mem_file("t");

        let (pinned_pid, handle) = pool.alloc_page(&file).unwrap();
        handle.write().as_mut_slice()[0] = 0x11;
        let pinned_frame = handle.frame_id();

        // Churn through many more pages than the pool holds.
        alloc_unpinned(&pool, &file, 10);

        // Still resident in the same frame, data intact.
        let again = pool.read_page(&file, pinned_pid).unwrap();
        assert_eq!(again.frame_id(), pinned_frame);
        assert_eq!(again.read().as_slice()[0], 0x11);
        pool.unpin_page(&file, pinned_pid, false).unwrap();
        pool.unpin_page(&file, pinned_pid, true).unwrap();
    }

    #[test]
    fn test_exhaustion_and_recovery() {
        let pool = BufMgr::new(3);
        let (file, _) = mem_file("t");

        let mut pids = Vec::new();
        for _ in 0..3 {
            let (pid, _) = pool.alloc_page(&file).unwrap();
            pids.push(pid);
        }

        // Every frame pinned: one more page cannot be served.
        assert!(matches!(
            pool.alloc_page(&file),
            Err(Error::BufferExceeded(3))
        ));

        // Unpinning one frame makes room.
        pool.unpin_page(&file, pids[0], false).unwrap();
        let (pid, _) = pool.alloc_page(&file).unwrap();
        pool.unpin_page(&file, pid, false).unwrap();

        for &pid in &pids[1..] {
            pool.unpin_page(&file, pid, false).unwrap();
        }
    }

    #[test]
    fn test_unpin_errors() {
        let pool = BufMgr::new(2);
        let (file, _) = mem_file("t");
        let pids = alloc_unpinned(&pool, &file, 1);

        // Already at pin count zero.
        assert!(matches!(
            pool.unpin_page(&file, pids[0], false),
            Err(Error::PageNotPinned { .. })
        ));

        // Never cached.
        assert!(matches!(
            pool.unpin_page(&file, PageId::new(99), false),
            Err(Error::PageNotResident { .. })
        ));
    }

    #[test]
    fn test_read_fault_leaves_pool_unchanged() {
        let pool = BufMgr::new(2);
        let (file, mem) = mem_file("t");
        let pids = alloc_unpinned(&pool, &file, 1);
        pool.flush_file(&file).unwrap();

        mem.set_fail_reads(true);
        assert!(matches!(
            pool.read_page(&file, pids[0]),
            Err(Error::Io(_))
        ));
        mem.set_fail_reads(false);

        // The failed read claimed no frame and inserted no mapping.
        assert!(matches!(
            pool.unpin_page(&file, pids[0], false),
            Err(Error::PageNotResident { .. })
        ));
    }

    #[test]
    fn test_flush_file_writes_and_invalidates() {
        let pool = BufMgr::new(4);
        let (file, _) = mem_file("t");

        let (pid, handle) = pool.alloc_page(&file).unwrap();
        handle.write().as_mut_slice()[3] = 0x33;
        pool.unpin_page(&file, pid, true).unwrap();

        pool.flush_file(&file).unwrap();

        // No longer resident.
        assert!(matches!(
            pool.unpin_page(&file, pid, false),
            Err(Error::PageNotResident { .. })
        ));
        // But durable.
        assert_eq!(file.read_page(pid).unwrap().as_slice()[3], 0x33);
    }

    #[test]
    fn test_flush_file_fails_on_pinned_page() {
        let pool = BufMgr::new(4);
        let (file, _) = mem_file("t");

        let (pid, _handle) = pool.alloc_page(&file).unwrap();
        assert!(matches!(
            pool.flush_file(&file),
            Err(Error::PagePinned { .. })
        ));
        pool.unpin_page(&file, pid, false).unwrap();
        pool.flush_file(&file).unwrap();
    }

    #[test]
    fn test_flush_file_only_touches_that_file() {
        let pool = BufMgr::new(4);
        let (file_a, _) = mem_file("a");
        let (file_b, _) = mem_file("b");

        let pids_a = alloc_unpinned(&pool, &file_a, 1);
        let pids_b = alloc_unpinned(&pool, &file_b, 1);

        pool.flush_file(&file_a).unwrap();

        assert!(matches!(
            pool.unpin_page(&file_a, pids_a[0], false),
            Err(Error::PageNotResident { .. })
        ));
        // file_b's page is still cached: re-reading is a hit with a pin.
        let before = pool.stats().snapshot();
        let _h = pool.read_page(&file_b, pids_b[0]).unwrap();
        assert_eq!(pool.stats().snapshot().cache_hits, before.cache_hits + 1);
        pool.unpin_page(&file_b, pids_b[0], false).unwrap();
    }

    #[test]
    fn test_dispose_page() {
        let pool = BufMgr::new(4);
        let (file, _) = mem_file("t");

        let (pid, _) = pool.alloc_page(&file).unwrap();
        pool.unpin_page(&file, pid, false).unwrap();
        pool.dispose_page(&file, pid).unwrap();

        // Gone from the pool and from the file.
        assert!(matches!(
            pool.unpin_page(&file, pid, false),
            Err(Error::PageNotResident { .. })
        ));
        assert!(matches!(
            file.read_page(pid),
            Err(Error::PageNotFound { .. })
        ));

        // Disposing again: not resident.
        assert!(matches!(
            pool.dispose_page(&file, pid),
            Err(Error::PageNotResident { .. })
        ));
    }

    #[test]
    fn test_same_page_id_in_two_files() {
        let pool = BufMgr::new(4);
        let (file_a, _) = mem_file("a");
        let (file_b, _) = mem_file("b");

        let (pid_a, ha) = pool.alloc_page(&file_a).unwrap();
        let (pid_b, hb) = pool.alloc_page(&file_b).unwrap();
        assert_eq!(pid_a, pid_b); // both files start at page 1

        ha.write().as_mut_slice()[0] = 0xA1;
        hb.write().as_mut_slice()[0] = 0xB1;
        pool.unpin_page(&file_a, pid_a, true).unwrap();
        pool.unpin_page(&file_b, pid_b, true).unwrap();

        assert_eq!(pool.read_page(&file_a, pid_a).unwrap().read().as_slice()[0], 0xA1);
        assert_eq!(pool.read_page(&file_b, pid_b).unwrap().read().as_slice()[0], 0xB1);
        pool.unpin_page(&file_a, pid_a, false).unwrap();
        pool.unpin_page(&file_b, pid_b, false).unwrap();
    }

    #[test]
    fn test_drop_writes_dirty_frames_back() {
        let (file, _) = mem_file("t");
        let pid;
        {
            let pool = BufMgr::new(2);
            let (p, handle) = pool.alloc_page(&file).unwrap();
            pid = p;
            handle.write().as_mut_slice()[0] = 0x5A;
            pool.unpin_page(&file, pid, true).unwrap();
        }
        assert_eq!(file.read_page(pid).unwrap().as_slice()[0], 0x5A);
    }
}
