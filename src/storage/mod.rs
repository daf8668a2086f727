//! Storage layer - files and page buffers.
//!
//! This module handles persistent storage:
//! - [`Page`] - The raw 4KB data container
//! - [`DbFile`] / [`DiskFile`] - Page-oriented file I/O

mod file;
pub mod page;

pub use file::{DbFile, DiskFile, FileRef};
pub use page::Page;
