//! The raw page container.

use crate::common::config::PAGE_SIZE;

/// A fixed-size block of bytes, the unit of all disk I/O.
///
/// # Alignment
/// `#[repr(align(4096))]` keeps every page on a 4KB boundary so the buffer
/// pool's frames line up with OS pages (and would satisfy O_DIRECT if the
/// file were opened that way).
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a zeroed page.
    pub fn new() -> Self {
        Self {
            data: [0; PAGE_SIZE],
        }
    }

    /// Immutable view of the page bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable view of the page bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero the page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Page {
    fn clone(&self) -> Self {
        Self { data: self.data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_starts_zeroed() {
        let page = Page::new();
        assert!(page.as_slice().iter().all(|&b| b == 0));
        assert_eq!(page.as_slice().len(), PAGE_SIZE);
    }

    #[test]
    fn test_page_write_and_reset() {
        let mut page = Page::new();
        page.as_mut_slice()[100] = 0xAB;
        assert_eq!(page.as_slice()[100], 0xAB);

        page.reset();
        assert!(page.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_page_alignment() {
        assert_eq!(std::mem::align_of::<Page>(), 4096);
        assert_eq!(std::mem::size_of::<Page>(), PAGE_SIZE);
    }

    #[test]
    fn test_page_clone_is_independent() {
        let mut a = Page::new();
        a.as_mut_slice()[0] = 1;
        let b = a.clone();
        a.as_mut_slice()[0] = 2;
        assert_eq!(b.as_slice()[0], 1);
    }
}
