//! Disk-backed B+Tree index.
//!
//! One index file per (relation, attribute) pair. Page 1 holds the metadata
//! ([`meta::IndexMetaInfo`]); the tree starts as a single leaf on page 2 and
//! grows upward through root splits. All node pages flow through the buffer
//! pool.
//!
//! Leaves chain left-to-right through sibling pointers, so a range scan
//! descends once and then walks the leaf level.

mod index;
mod key;
mod meta;
mod node;

pub use index::{index_file_name, BTreeIndex};
pub use key::{Key, KeyType, ScanOp, STRING_KEY_SIZE};
