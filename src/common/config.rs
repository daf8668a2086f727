//! Compile-time configuration constants.

/// Size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems. Every on-disk structure in the
/// crate (index nodes, the metadata page) is laid out against this constant,
/// so changing it changes the file format.
///
/// # Alignment
/// Pages are aligned to 4096 bytes for efficient Direct I/O (O_DIRECT).
pub const PAGE_SIZE: usize = 4096;

/// On-disk width of a page id (u32, little-endian).
pub const PAGE_ID_SIZE: usize = 4;

/// On-disk width of an index node's level word (u32, little-endian).
pub const LEVEL_SIZE: usize = 4;
