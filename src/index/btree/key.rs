//! Index key types and comparison.
//!
//! Keys are a tagged sum over the three supported attribute types, compared
//! by one generic comparator. Node capacities are functions of the key width
//! and the fixed page size, so they live here next to the widths they derive
//! from.

use std::cmp::Ordering;

use crate::common::config::{LEVEL_SIZE, PAGE_ID_SIZE, PAGE_SIZE};
use crate::common::{Error, RecordId, Result};

/// Width of a string key: a fixed prefix of the attribute's bytes.
pub const STRING_KEY_SIZE: usize = 10;

/// The attribute type an index is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Int,
    Double,
    Str,
}

impl KeyType {
    /// On-disk tag, stored in the index metadata page.
    pub fn tag(self) -> u8 {
        match self {
            KeyType::Int => 0,
            KeyType::Double => 1,
            KeyType::Str => 2,
        }
    }

    /// Decode a metadata tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(KeyType::Int),
            1 => Some(KeyType::Double),
            2 => Some(KeyType::Str),
            _ => None,
        }
    }

    /// On-disk width of one key of this type.
    pub const fn key_size(self) -> usize {
        match self {
            KeyType::Int => 4,
            KeyType::Double => 8,
            KeyType::Str => STRING_KEY_SIZE,
        }
    }

    /// Entries a leaf page holds: keys and record ids packed in parallel
    /// arrays, with the sibling pointer taking one page-id slot.
    pub const fn leaf_occupancy(self) -> usize {
        (PAGE_SIZE - PAGE_ID_SIZE) / (self.key_size() + RecordId::SIZE)
    }

    /// Keys a non-leaf page holds: a level word, the key array, and one more
    /// page id than keys. The double variant gives up one slot to padding;
    /// reproduced for layout compatibility.
    pub const fn nonleaf_occupancy(self) -> usize {
        let base = (PAGE_SIZE - LEVEL_SIZE - PAGE_ID_SIZE) / (self.key_size() + PAGE_ID_SIZE);
        match self {
            KeyType::Double => base - 1,
            _ => base,
        }
    }

    /// Decode a key from the head of `buf`.
    ///
    /// # Panics
    /// Panics if `buf.len() < self.key_size()`.
    pub fn read_key(self, buf: &[u8]) -> Key {
        match self {
            KeyType::Int => Key::Int(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
            KeyType::Double => Key::Double(f64::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
            ])),
            KeyType::Str => {
                let mut bytes = [0u8; STRING_KEY_SIZE];
                bytes.copy_from_slice(&buf[..STRING_KEY_SIZE]);
                Key::Str(bytes)
            }
        }
    }

    /// Extract the key of a relation record at `offset`.
    ///
    /// String attributes may run past the end of a short record; the key is
    /// the available bytes zero-padded to the fixed width. Numeric
    /// attributes must fit entirely.
    pub fn extract(self, record: &[u8], offset: usize) -> Result<Key> {
        let short = |len| Error::BadRecord { offset, len };
        match self {
            KeyType::Str => {
                if offset >= record.len() {
                    return Err(short(record.len()));
                }
                let avail = &record[offset..];
                let take = avail.len().min(STRING_KEY_SIZE);
                let mut bytes = [0u8; STRING_KEY_SIZE];
                bytes[..take].copy_from_slice(&avail[..take]);
                Ok(Key::Str(bytes))
            }
            _ => {
                if offset + self.key_size() > record.len() {
                    return Err(short(record.len()));
                }
                Ok(self.read_key(&record[offset..]))
            }
        }
    }
}

/// One index key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Key {
    Int(i32),
    Double(f64),
    Str([u8; STRING_KEY_SIZE]),
}

impl Key {
    /// The type this key belongs to.
    pub fn key_type(&self) -> KeyType {
        match self {
            Key::Int(_) => KeyType::Int,
            Key::Double(_) => KeyType::Double,
            Key::Str(_) => KeyType::Str,
        }
    }

    /// Build a string key from text, truncating or zero-padding to the
    /// fixed width.
    pub fn str(s: &str) -> Key {
        let mut bytes = [0u8; STRING_KEY_SIZE];
        let take = s.len().min(STRING_KEY_SIZE);
        bytes[..take].copy_from_slice(&s.as_bytes()[..take]);
        Key::Str(bytes)
    }

    /// Total order over keys of the same type.
    ///
    /// Doubles use `total_cmp`; the tree never stores NaN-adjacent orderings
    /// differently from IEEE comparison for the finite values it holds.
    ///
    /// # Panics
    /// Panics on mismatched key types - an index holds exactly one type, and
    /// the public entry points reject foreign keys before any comparison.
    pub fn cmp(&self, other: &Key) -> Ordering {
        match (self, other) {
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Double(a), Key::Double(b)) => a.total_cmp(b),
            (Key::Str(a), Key::Str(b)) => a.cmp(b),
            _ => panic!(
                "cannot compare {:?} key with {:?} key",
                self.key_type(),
                other.key_type()
            ),
        }
    }

    /// Encode this key at the head of `buf`.
    ///
    /// # Panics
    /// Panics if `buf` is shorter than the key width.
    pub fn write_to(&self, buf: &mut [u8]) {
        match self {
            Key::Int(v) => buf[..4].copy_from_slice(&v.to_le_bytes()),
            Key::Double(v) => buf[..8].copy_from_slice(&v.to_le_bytes()),
            Key::Str(v) => buf[..STRING_KEY_SIZE].copy_from_slice(v),
        }
    }
}

/// Range scan comparison operators.
///
/// A scan's low bound takes [`ScanOp::Gt`] or [`ScanOp::Gte`]; its high
/// bound takes [`ScanOp::Lt`] or [`ScanOp::Lte`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOp {
    Lt,
    Lte,
    Gte,
    Gt,
}

impl ScanOp {
    /// Evaluate `key self bound`.
    pub fn compare(self, key: &Key, bound: &Key) -> bool {
        let ord = key.cmp(bound);
        match self {
            ScanOp::Lt => ord == Ordering::Less,
            ScanOp::Lte => ord != Ordering::Greater,
            ScanOp::Gte => ord != Ordering::Less,
            ScanOp::Gt => ord == Ordering::Greater,
        }
    }
}
