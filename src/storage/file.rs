//! File abstraction and its disk-backed implementation.
//!
//! The buffer pool serves pages from many files at once, so it talks to them
//! through the object-safe [`DbFile`] trait and keys its page table by
//! [`FileId`]. [`DiskFile`] is the standard implementation over a regular
//! file; tests substitute their own.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, FileId, PageId, Result};
use crate::storage::page::Page;

/// A durable container of fixed-size pages.
///
/// Pages are numbered from 1; page id 0 is the reserved "no page" sentinel.
/// Reading an unallocated or deleted id fails with [`Error::PageNotFound`].
pub trait DbFile: Send + Sync {
    /// Process-unique identity of this file handle.
    fn file_id(&self) -> FileId;

    /// The file's name (the path it was opened with).
    fn filename(&self) -> &str;

    /// Read one page from disk.
    fn read_page(&self, page_no: PageId) -> Result<Page>;

    /// Write one page to disk and sync it.
    fn write_page(&self, page_no: PageId, page: &Page) -> Result<()>;

    /// Allocate a new zeroed page, returning its id.
    fn allocate_page(&self) -> Result<PageId>;

    /// Delete a page. Subsequent reads of the id fail; the slot may be
    /// reused by a later allocation.
    fn delete_page(&self, page_no: PageId) -> Result<()>;
}

/// Shared handle to an open file.
pub type FileRef = Arc<dyn DbFile>;

struct DiskFileInner {
    file: File,
    /// Highest page id ever allocated.
    page_count: u32,
    /// Deleted ids available for reuse. In-memory only: a reopened file
    /// starts with an empty set and extends from the end instead.
    deleted: BTreeSet<u32>,
}

/// A [`DbFile`] backed by one file on disk.
///
/// Page `n` lives at byte offset `(n - 1) * PAGE_SIZE`. Writes are synced
/// immediately (`sync_all`), trading throughput for the durability the
/// buffer pool's flush contract assumes.
pub struct DiskFile {
    id: FileId,
    name: String,
    inner: Mutex<DiskFileInner>,
}

impl DiskFile {
    /// Create a new file. Fails if the path already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok(Self::wrap(file, &path, 0))
    }

    /// Open an existing file. Fails if the path does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        let page_count = (len / PAGE_SIZE as u64) as u32;
        Ok(Self::wrap(file, &path, page_count))
    }

    /// Open a file, creating it if it does not exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn wrap<P: AsRef<Path>>(file: File, path: &P, page_count: u32) -> Self {
        Self {
            id: FileId::next(),
            name: path.as_ref().to_string_lossy().into_owned(),
            inner: Mutex::new(DiskFileInner {
                file,
                page_count,
                deleted: BTreeSet::new(),
            }),
        }
    }

    /// Number of pages currently allocated (including deleted slots).
    pub fn page_count(&self) -> u32 {
        self.inner.lock().page_count
    }

    fn not_found(&self, page_no: PageId) -> Error {
        Error::PageNotFound {
            file: self.name.clone(),
            page: page_no,
        }
    }

    fn check_valid(&self, inner: &DiskFileInner, page_no: PageId) -> Result<()> {
        if !page_no.is_valid()
            || page_no.0 > inner.page_count
            || inner.deleted.contains(&page_no.0)
        {
            return Err(self.not_found(page_no));
        }
        Ok(())
    }

    fn offset(page_no: PageId) -> u64 {
        (page_no.0 as u64 - 1) * PAGE_SIZE as u64
    }
}

impl DbFile for DiskFile {
    fn file_id(&self) -> FileId {
        self.id
    }

    fn filename(&self) -> &str {
        &self.name
    }

    fn read_page(&self, page_no: PageId) -> Result<Page> {
        let mut inner = self.inner.lock();
        self.check_valid(&inner, page_no)?;

        let mut page = Page::new();
        inner.file.seek(SeekFrom::Start(Self::offset(page_no)))?;
        inner.file.read_exact(page.as_mut_slice())?;
        Ok(page)
    }

    fn write_page(&self, page_no: PageId, page: &Page) -> Result<()> {
        let mut inner = self.inner.lock();
        self.check_valid(&inner, page_no)?;

        inner.file.seek(SeekFrom::Start(Self::offset(page_no)))?;
        inner.file.write_all(page.as_slice())?;
        inner.file.sync_all()?;
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let mut inner = self.inner.lock();

        // Reuse the smallest deleted slot before extending the file.
        let page_no = match inner.deleted.iter().next().copied() {
            Some(reused) => {
                inner.deleted.remove(&reused);
                PageId::new(reused)
            }
            None => {
                inner.page_count += 1;
                PageId::new(inner.page_count)
            }
        };

        let zeroed = Page::new();
        inner.file.seek(SeekFrom::Start(Self::offset(page_no)))?;
        inner.file.write_all(zeroed.as_slice())?;
        inner.file.sync_all()?;
        Ok(page_no)
    }

    fn delete_page(&self, page_no: PageId) -> Result<()> {
        let mut inner = self.inner.lock();
        self.check_valid(&inner, page_no)?;
        inner.deleted.insert(page_no.0);
        Ok(())
    }
}
