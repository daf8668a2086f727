//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache layer between page clients (the
//! index) and files. It manages a fixed pool of frames, each holding one
//! page, with pin-counted access and clock eviction.
//!
//! # Components
//! - [`BufMgr`] - The buffer manager itself
//! - [`Frame`] - A slot in the pool holding a page + its descriptor
//! - [`PageHandle`] - Borrowed view of a pinned page
//! - [`BufferStats`] - Performance statistics
//! - [`replacer`] - The clock eviction policy

mod buf_mgr;
mod frame;
mod page_handle;
pub mod replacer;
mod stats;

#[cfg(test)]
pub(crate) mod test_util;

pub use buf_mgr::BufMgr;
pub use frame::Frame;
pub use page_handle::PageHandle;
pub use stats::{BufferStats, StatsSnapshot};
