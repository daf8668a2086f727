//! On-disk B+Tree node shapes and their byte codecs.
//!
//! Nodes are deserialized into owned structs, mutated, and written back
//! whole. Both shapes store an occupied prefix with a zeroed tail: a leaf
//! slot is empty when its record id's page number is 0, a non-leaf child
//! slot when the page id is 0.
//!
//! # Leaf layout
//! ```text
//! [keys: occupancy * key_size][rids: occupancy * 8][right_sib: u32]
//! ```
//! # Non-leaf layout
//! ```text
//! [level: u32][keys: occupancy * key_size][page_nos: (occupancy + 1) * 4]
//! ```
//! `level == 1` means the children are leaves.

use std::cmp::Ordering;

use crate::common::config::LEVEL_SIZE;
use crate::common::{PageId, RecordId};
use crate::index::btree::key::{Key, KeyType};
use crate::storage::Page;

/// Level value of a non-leaf node whose children are leaves.
pub const LEVEL_ABOVE_LEAVES: u32 = 1;

/// A leaf node: sorted keys parallel to record ids, plus the sibling link.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub keys: Vec<Key>,
    pub rids: Vec<RecordId>,
    /// Next leaf in key order; `PageId::INVALID` at the rightmost leaf.
    pub right_sib: PageId,
}

impl LeafNode {
    /// An empty leaf with no sibling.
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            rids: Vec::new(),
            right_sib: PageId::INVALID,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Decode a leaf from a page.
    pub fn read_from(page: &Page, key_type: KeyType, occupancy: usize) -> Self {
        let data = page.as_slice();
        let key_size = key_type.key_size();
        let rid_base = occupancy * key_size;

        let mut node = Self::new();
        for i in 0..occupancy {
            let rid = RecordId::from_bytes(&data[rid_base + i * RecordId::SIZE..]);
            if rid.is_null() {
                break;
            }
            node.keys.push(key_type.read_key(&data[i * key_size..]));
            node.rids.push(rid);
        }

        let sib_off = rid_base + occupancy * RecordId::SIZE;
        node.right_sib = PageId::new(u32::from_le_bytes([
            data[sib_off],
            data[sib_off + 1],
            data[sib_off + 2],
            data[sib_off + 3],
        ]));
        node
    }

    /// Encode this leaf into a page, zeroing unused slots.
    pub fn write_to(&self, page: &mut Page, key_type: KeyType, occupancy: usize) {
        debug_assert!(self.keys.len() <= occupancy);
        debug_assert_eq!(self.keys.len(), self.rids.len());

        page.reset();
        let data = page.as_mut_slice();
        let key_size = key_type.key_size();
        let rid_base = occupancy * key_size;

        for (i, (key, rid)) in self.keys.iter().zip(&self.rids).enumerate() {
            key.write_to(&mut data[i * key_size..]);
            rid.write_to(&mut data[rid_base + i * RecordId::SIZE..]);
        }

        let sib_off = rid_base + occupancy * RecordId::SIZE;
        data[sib_off..sib_off + 4].copy_from_slice(&self.right_sib.0.to_le_bytes());
    }

    /// Insert at the sorted position. An entry whose key equals existing
    /// keys goes after them - duplicates are kept in insertion order.
    pub fn insert(&mut self, key: Key, rid: RecordId) {
        let at = self
            .keys
            .partition_point(|k| k.cmp(&key) != Ordering::Greater);
        self.keys.insert(at, key);
        self.rids.insert(at, rid);
    }

    /// Move entries from slot `at` upward into a new right sibling.
    ///
    /// The new node carries no sibling link; the caller threads the chain.
    pub fn split_off(&mut self, at: usize) -> LeafNode {
        LeafNode {
            keys: self.keys.split_off(at),
            rids: self.rids.split_off(at),
            right_sib: PageId::INVALID,
        }
    }
}

impl Default for LeafNode {
    fn default() -> Self {
        Self::new()
    }
}

/// A non-leaf node: sorted separator keys and one more child pointer.
///
/// Child `pages[i]` holds keys in `[keys[i-1], keys[i])`, open at the ends.
#[derive(Debug, Clone, PartialEq)]
pub struct NonLeafNode {
    /// 1 when the children are leaves, 0 otherwise.
    pub level: u32,
    pub keys: Vec<Key>,
    pub pages: Vec<PageId>,
}

impl NonLeafNode {
    /// A node over exactly two children, as created by a root split.
    pub fn with_children(level: u32, separator: Key, left: PageId, right: PageId) -> Self {
        Self {
            level,
            keys: vec![separator],
            pages: vec![left, right],
        }
    }

    /// True when the children of this node are leaf pages.
    pub fn children_are_leaves(&self) -> bool {
        self.level == LEVEL_ABOVE_LEAVES
    }

    /// Decode a non-leaf node from a page.
    pub fn read_from(page: &Page, key_type: KeyType, occupancy: usize) -> Self {
        let data = page.as_slice();
        let key_size = key_type.key_size();
        let level = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let pages_base = LEVEL_SIZE + occupancy * key_size;

        let mut pages = Vec::new();
        for i in 0..=occupancy {
            let off = pages_base + i * 4;
            let page_no = PageId::new(u32::from_le_bytes([
                data[off],
                data[off + 1],
                data[off + 2],
                data[off + 3],
            ]));
            if !page_no.is_valid() {
                break;
            }
            pages.push(page_no);
        }

        let num_keys = pages.len().saturating_sub(1);
        let keys = (0..num_keys)
            .map(|i| key_type.read_key(&data[LEVEL_SIZE + i * key_size..]))
            .collect();

        Self { level, keys, pages }
    }

    /// Encode this node into a page, zeroing unused slots.
    pub fn write_to(&self, page: &mut Page, key_type: KeyType, occupancy: usize) {
        debug_assert!(self.keys.len() <= occupancy);
        debug_assert_eq!(self.pages.len(), self.keys.len() + 1);

        page.reset();
        let data = page.as_mut_slice();
        let key_size = key_type.key_size();

        data[..4].copy_from_slice(&self.level.to_le_bytes());
        for (i, key) in self.keys.iter().enumerate() {
            key.write_to(&mut data[LEVEL_SIZE + i * key_size..]);
        }

        let pages_base = LEVEL_SIZE + occupancy * key_size;
        for (i, page_no) in self.pages.iter().enumerate() {
            let off = pages_base + i * 4;
            data[off..off + 4].copy_from_slice(&page_no.0.to_le_bytes());
        }
    }

    /// Number of separator keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The child whose key range contains `key`: the first separator
    /// strictly greater than `key` bounds it on the right, so a key equal
    /// to a separator descends to that separator's right.
    pub fn choose_subtree(&self, key: &Key) -> PageId {
        let at = self
            .keys
            .partition_point(|k| k.cmp(key) != Ordering::Greater);
        self.pages[at]
    }

    /// The child a range scan descends into for lower bound `low`.
    ///
    /// Unlike [`NonLeafNode::choose_subtree`], a bound equal to a separator
    /// goes *left*: leaf separators are keys still present in the left
    /// half, so an inclusive scan starting exactly on one must visit the
    /// left leaf first (sibling traversal then covers the right half).
    pub fn choose_scan_subtree(&self, low: &Key) -> PageId {
        let at = self.keys.partition_point(|k| k.cmp(low) == Ordering::Less);
        self.pages[at]
    }

    /// Insert a separator and the page to its right at the sorted position.
    pub fn insert(&mut self, separator: Key, page_no: PageId) {
        let at = self
            .keys
            .partition_point(|k| k.cmp(&separator) != Ordering::Greater);
        self.keys.insert(at, separator);
        self.pages.insert(at + 1, page_no);
    }

    /// Insert into a full node and split, promoting the middle key.
    ///
    /// Returns the promoted separator and the new right node; `self` keeps
    /// the left half. The promoted key lives in neither half.
    pub fn split_insert(&mut self, separator: Key, page_no: PageId) -> (Key, NonLeafNode) {
        self.insert(separator, page_no);

        let mid = self.keys.len() / 2;
        let right_keys = self.keys.split_off(mid + 1);
        let right_pages = self.pages.split_off(mid + 1);
        let promoted = self.keys.remove(mid);

        let right = NonLeafNode {
            level: self.level,
            keys: right_keys,
            pages: right_pages,
        };
        (promoted, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: u32) -> RecordId {
        RecordId::new(PageId::new(n), n as u16)
    }

    #[test]
    fn test_leaf_insert_keeps_sorted_order() {
        let mut leaf = LeafNode::new();
        for v in [5, 1, 9, 3] {
            leaf.insert(Key::Int(v), rid(v as u32));
        }
        let got: Vec<_> = leaf.keys.iter().map(|k| match k {
            Key::Int(v) => *v,
            _ => unreachable!(),
        }).collect();
        assert_eq!(got, vec![1, 3, 5, 9]);
    }

    #[test]
    fn test_leaf_duplicates_append_after_equals() {
        let mut leaf = LeafNode::new();
        leaf.insert(Key::Int(7), rid(1));
        leaf.insert(Key::Int(7), rid(2));
        leaf.insert(Key::Int(7), rid(3));

        assert_eq!(leaf.rids, vec![rid(1), rid(2), rid(3)]);
    }

    #[test]
    fn test_leaf_codec_roundtrip_with_sentinels() {
        let mut leaf = LeafNode::new();
        leaf.insert(Key::Int(10), rid(1));
        leaf.insert(Key::Int(20), rid(2));
        leaf.right_sib = PageId::new(9);

        let occupancy = KeyType::Int.leaf_occupancy();
        let mut page = Page::new();
        leaf.write_to(&mut page, KeyType::Int, occupancy);

        let back = LeafNode::read_from(&page, KeyType::Int, occupancy);
        assert_eq!(back, leaf);
    }

    #[test]
    fn test_empty_leaf_decodes_from_zeroed_page() {
        let page = Page::new();
        let leaf = LeafNode::read_from(&page, KeyType::Str, KeyType::Str.leaf_occupancy());
        assert!(leaf.is_empty());
        assert!(!leaf.right_sib.is_valid());
    }

    #[test]
    fn test_leaf_split_off() {
        let mut leaf = LeafNode::new();
        for v in 1..=6 {
            leaf.insert(Key::Int(v), rid(v as u32));
        }
        leaf.right_sib = PageId::new(42);

        let right = leaf.split_off(4);
        assert_eq!(leaf.len(), 4);
        assert_eq!(right.len(), 2);
        assert_eq!(right.keys[0], Key::Int(5));
        // Sibling chain is the caller's job.
        assert!(!right.right_sib.is_valid());
        assert_eq!(leaf.right_sib, PageId::new(42));
    }

    #[test]
    fn test_nonleaf_choose_subtree_intervals() {
        let node = NonLeafNode {
            level: LEVEL_ABOVE_LEAVES,
            keys: vec![Key::Int(10), Key::Int(20)],
            pages: vec![PageId::new(2), PageId::new(3), PageId::new(4)],
        };

        assert_eq!(node.choose_subtree(&Key::Int(5)), PageId::new(2));
        // A key equal to a separator belongs to the right interval.
        assert_eq!(node.choose_subtree(&Key::Int(10)), PageId::new(3));
        assert_eq!(node.choose_subtree(&Key::Int(15)), PageId::new(3));
        assert_eq!(node.choose_subtree(&Key::Int(20)), PageId::new(4));
        assert_eq!(node.choose_subtree(&Key::Int(99)), PageId::new(4));
    }

    #[test]
    fn test_scan_descent_goes_left_on_equal_separator() {
        let node = NonLeafNode {
            level: LEVEL_ABOVE_LEAVES,
            keys: vec![Key::Int(10), Key::Int(20)],
            pages: vec![PageId::new(2), PageId::new(3), PageId::new(4)],
        };

        assert_eq!(node.choose_scan_subtree(&Key::Int(10)), PageId::new(2));
        assert_eq!(node.choose_scan_subtree(&Key::Int(11)), PageId::new(3));
        assert_eq!(node.choose_scan_subtree(&Key::Int(20)), PageId::new(3));
        assert_eq!(node.choose_scan_subtree(&Key::Int(21)), PageId::new(4));
    }

    #[test]
    fn test_nonleaf_insert_positions_child_right_of_key() {
        let mut node = NonLeafNode::with_children(
            LEVEL_ABOVE_LEAVES,
            Key::Int(10),
            PageId::new(2),
            PageId::new(3),
        );
        node.insert(Key::Int(5), PageId::new(4));

        assert_eq!(node.keys, vec![Key::Int(5), Key::Int(10)]);
        assert_eq!(
            node.pages,
            vec![PageId::new(2), PageId::new(4), PageId::new(3)]
        );
    }

    #[test]
    fn test_nonleaf_codec_roundtrip() {
        let node = NonLeafNode {
            level: 0,
            keys: vec![Key::str("alpha"), Key::str("omega")],
            pages: vec![PageId::new(5), PageId::new(6), PageId::new(7)],
        };

        let occupancy = KeyType::Str.nonleaf_occupancy();
        let mut page = Page::new();
        node.write_to(&mut page, KeyType::Str, occupancy);

        let back = NonLeafNode::read_from(&page, KeyType::Str, occupancy);
        assert_eq!(back, node);
    }

    #[test]
    fn test_nonleaf_split_insert_promotes_middle() {
        // A "full" node of 4 keys (occupancy 4 for the test's purposes).
        let mut node = NonLeafNode {
            level: 0,
            keys: vec![Key::Int(10), Key::Int(20), Key::Int(30), Key::Int(40)],
            pages: (2..=6).map(PageId::new).collect(),
        };

        let (promoted, right) = node.split_insert(Key::Int(25), PageId::new(7));

        // Virtual sequence: 10 20 25 30 40 -> middle (25) promoted.
        assert_eq!(promoted, Key::Int(25));
        assert_eq!(node.keys, vec![Key::Int(10), Key::Int(20)]);
        assert_eq!(
            node.pages,
            vec![PageId::new(2), PageId::new(3), PageId::new(4)]
        );
        assert_eq!(right.keys, vec![Key::Int(30), Key::Int(40)]);
        assert_eq!(
            right.pages,
            vec![PageId::new(7), PageId::new(5), PageId::new(6)]
        );
        assert_eq!(right.level, 0);
    }
}
