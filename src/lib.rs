//! # burrowdb
//!
//! The storage core of a teaching database engine: a page-oriented file
//! layer, a pin-counted buffer pool with clock eviction, and a disk-backed
//! B+Tree secondary index built on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────┐
//! │     index  (B+Tree)         │
//! ├─────────────────────────────┤
//! │     buffer (BufMgr)         │
//! ├─────────────────────────────┤
//! │     storage (DiskFile)      │
//! └─────────────────────────────┘
//! ```
//!
//! - [`storage`] reads and writes fixed-size 4KB pages in files, numbered
//!   from 1.
//! - [`buffer`] caches pages in a fixed pool of frames. Clients pin a page to
//!   hold it resident, mark it dirty after writes, and unpin it when done;
//!   unpinned frames are reclaimed by a clock replacer.
//! - [`index`] stores `(key, record id)` entries in a B+Tree whose nodes are
//!   buffer-pool pages, supporting insertion and ordered range scans over
//!   int, double, and fixed-width string keys.

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

pub use buffer::{BufMgr, BufferStats, Frame, PageHandle, StatsSnapshot};
pub use common::config::PAGE_SIZE;
pub use common::{Error, FileId, FrameId, PageId, RecordId, Result};
pub use index::{index_file_name, BTreeIndex, Key, KeyType, RelationScan, ScanOp};
pub use storage::{DbFile, DiskFile, FileRef, Page};
