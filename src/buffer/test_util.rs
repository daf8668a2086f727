//! In-memory file for buffer tests. Avoids disk round-trips so the unit
//! suites stay fast.

use parking_lot::Mutex;

use crate::common::{Error, FileId, PageId, Result};
use crate::storage::{DbFile, Page};

/// A [`DbFile`] backed by a vector of pages.
pub(crate) struct MemFile {
    id: FileId,
    name: String,
    /// Index i holds page i+1; `None` = deleted.
    pages: Mutex<Vec<Option<Page>>>,
    /// When set, every read fails. Simulates an I/O fault.
    fail_reads: Mutex<bool>,
}

impl MemFile {
    pub fn new(name: &str) -> Self {
        Self {
            id: FileId::next(),
            name: name.to_string(),
            pages: Mutex::new(Vec::new()),
            fail_reads: Mutex::new(false),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock() = fail;
    }
}

impl DbFile for MemFile {
    fn file_id(&self) -> FileId {
        self.id
    }

    fn filename(&self) -> &str {
        &self.name
    }

    fn read_page(&self, page_no: PageId) -> Result<Page> {
        if *self.fail_reads.lock() {
            return Err(Error::Io(std::io::Error::other("injected read fault")));
        }
        let pages = self.pages.lock();
        pages
            .get(page_no.0.wrapping_sub(1) as usize)
            .and_then(|slot| slot.as_ref())
            .map(Page::clone)
            .ok_or_else(|| Error::PageNotFound {
                file: self.name.clone(),
                page: page_no,
            })
    }

    fn write_page(&self, page_no: PageId, page: &Page) -> Result<()> {
        let mut pages = self.pages.lock();
        match pages
            .get_mut(page_no.0.wrapping_sub(1) as usize)
            .and_then(|slot| slot.as_mut())
        {
            Some(slot) => {
                *slot = page.clone();
                Ok(())
            }
            None => Err(Error::PageNotFound {
                file: self.name.clone(),
                page: page_no,
            }),
        }
    }

    fn allocate_page(&self) -> Result<PageId> {
        let mut pages = self.pages.lock();
        if let Some(i) = pages.iter().position(|slot| slot.is_none()) {
            pages[i] = Some(Page::new());
            return Ok(PageId::new(i as u32 + 1));
        }
        pages.push(Some(Page::new()));
        Ok(PageId::new(pages.len() as u32))
    }

    fn delete_page(&self, page_no: PageId) -> Result<()> {
        let mut pages = self.pages.lock();
        match pages.get_mut(page_no.0.wrapping_sub(1) as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(Error::PageNotFound {
                file: self.name.clone(),
                page: page_no,
            }),
        }
    }
}
