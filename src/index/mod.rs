//! Access methods over relations.
//!
//! An index maps attribute values to the record ids holding them. The only
//! access method implemented is the disk-backed B+Tree in [`btree`].

pub mod btree;

use crate::common::{RecordId, Result};

/// A forward scan over a relation's records, used to bulk-load an index.
///
/// Implementations hand out record ids one at a time; [`get_record`] exposes
/// the bytes of the record most recently returned by [`scan_next`].
///
/// [`scan_next`]: RelationScan::scan_next
/// [`get_record`]: RelationScan::get_record
pub trait RelationScan {
    /// The next record id, or `None` once the relation is exhausted.
    fn scan_next(&mut self) -> Result<Option<RecordId>>;

    /// The bytes of the record last returned by `scan_next`.
    ///
    /// Fails with [`Error::ScanNotInitialized`](crate::common::Error) before
    /// the first `scan_next` call.
    fn get_record(&self) -> Result<&[u8]>;
}

pub use btree::{index_file_name, BTreeIndex, Key, KeyType, ScanOp};
