//! Crate-wide error type.

use thiserror::Error;

use crate::common::PageId;
use crate::index::btree::KeyType;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in burrowdb.
///
/// One enum for the whole crate keeps error handling consistent between the
/// buffer pool and the index. Note that [`Error::ScanCompleted`] is an
/// expected termination signal, not a failure: a range scan reports its end
/// through it.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist in the file (never allocated, or
    /// deleted).
    #[error("{page} not found in file '{file}'")]
    PageNotFound { file: String, page: PageId },

    /// The page is not resident in the buffer pool.
    #[error("{page} of file '{file}' is not in the buffer pool")]
    PageNotResident { file: String, page: PageId },

    /// Every frame in the pool is pinned; nothing can be evicted.
    #[error("buffer exceeded: all {0} frames are pinned")]
    BufferExceeded(usize),

    /// Attempted to unpin a page whose pin count is already zero.
    ///
    /// This indicates a bug in the caller - unpins must match pins.
    #[error("{page} of file '{file}' is not pinned")]
    PageNotPinned { file: String, page: PageId },

    /// Attempted to flush a file while one of its pages is still pinned.
    #[error("cannot flush file '{file}': {page} is still pinned")]
    PagePinned { file: String, page: PageId },

    /// Index file metadata does not match the requested relation name,
    /// attribute offset, or attribute type.
    #[error("index metadata mismatch in '{0}'")]
    BadIndexInfo(String),

    /// A relation record is too short to hold a key at the requested offset.
    #[error("record of {len} bytes cannot hold a key at offset {offset}")]
    BadRecord { offset: usize, len: usize },

    /// A key of the wrong type was handed to an index.
    #[error("key type mismatch: index holds {expected:?} keys, got {found:?}")]
    KeyTypeMismatch { expected: KeyType, found: KeyType },

    /// Scan operators must be GT/GTE for the low bound and LT/LTE for the
    /// high bound.
    #[error("bad scan opcodes: low bound takes GT/GTE, high bound takes LT/LTE")]
    BadOpcodes,

    /// The scan's low bound exceeds its high bound.
    #[error("bad scan range: low value exceeds high value")]
    BadScanRange,

    /// `scan_next`/`end_scan` called with no scan in progress.
    #[error("scan not initialized")]
    ScanNotInitialized,

    /// The scan has passed its last qualifying entry.
    #[error("scan completed")]
    ScanCompleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound {
            file: "rel.0".into(),
            page: PageId::new(42),
        };
        assert_eq!(format!("{}", err), "Page(42) not found in file 'rel.0'");

        let err = Error::BufferExceeded(16);
        assert_eq!(format!("{}", err), "buffer exceeded: all 16 frames are pinned");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(might_fail().unwrap(), 42);
    }
}
