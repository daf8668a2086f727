//! File identity type.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of an open file.
///
/// The buffer pool serves pages from many files, so its page table is keyed
/// by `(FileId, PageId)`. Identity, not path equality: two handles opened on
/// the same path are distinct files as far as the pool is concerned, matching
/// the single-actor ownership model (one handle drives one file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u64);

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

impl FileId {
    /// Hand out the next process-unique id.
    pub fn next() -> Self {
        FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}
