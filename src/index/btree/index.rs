//! The B+Tree index over one attribute of a relation.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use crate::buffer::BufMgr;
use crate::common::{Error, PageId, RecordId, Result};
use crate::index::btree::key::{Key, KeyType, ScanOp};
use crate::index::btree::meta::{IndexMetaInfo, RELATION_NAME_LEN};
use crate::index::btree::node::{LeafNode, NonLeafNode, LEVEL_ABOVE_LEAVES};
use crate::index::RelationScan;
use crate::storage::{DiskFile, FileRef};

/// The metadata page of every index file.
const HEADER_PAGE_NO: PageId = PageId(1);

/// Where the root starts out. The root moves on its first split, after
/// which it is always a non-leaf page; `root == INITIAL_ROOT_PAGE_NO` is
/// therefore exactly the "root is still a leaf" condition.
const INITIAL_ROOT_PAGE_NO: PageId = PageId(2);

/// The index file name derived from a relation and the indexed attribute.
pub fn index_file_name(relation_name: &str, attr_byte_offset: usize) -> String {
    format!("{relation_name}.{attr_byte_offset}")
}

/// What an insertion reports to the level above it.
enum InsertOutcome {
    NoSplit,
    Split { separator: Key, new_page: PageId },
}

/// Cursor state of an active range scan.
///
/// The current leaf stays pinned between `scan_next` calls so it cannot be
/// evicted out from under the cursor.
struct ScanState {
    cur_page: PageId,
    next_entry: usize,
    high: Key,
    high_op: ScanOp,
}

/// A disk-backed B+Tree secondary index.
///
/// One index file holds one tree over one attribute. All page access goes
/// through the [`BufMgr`]; the index itself never touches the file directly
/// except to create or open it.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use burrowdb::{BTreeIndex, BufMgr, Key, KeyType, ScanOp};
/// # use burrowdb::{RecordId, RelationScan, Result};
/// # struct NoRecords;
/// # impl RelationScan for NoRecords {
/// #     fn scan_next(&mut self) -> Result<Option<RecordId>> { Ok(None) }
/// #     fn get_record(&self) -> Result<&[u8]> { unreachable!() }
/// # }
///
/// let pool = Arc::new(BufMgr::new(64));
/// let mut relation = NoRecords;
/// let mut index = BTreeIndex::open("orders", pool, 0, KeyType::Int, &mut relation).unwrap();
///
/// index.start_scan(&Key::Int(10), ScanOp::Gte, &Key::Int(20), ScanOp::Lte).unwrap();
/// while let Ok(rid) = index.scan_next() {
///     println!("{rid}");
/// }
/// index.end_scan().unwrap();
/// ```
pub struct BTreeIndex {
    buf_mgr: Arc<BufMgr>,
    file: FileRef,
    index_name: String,
    header_page_num: PageId,
    root_page_num: PageId,
    attr_type: KeyType,
    leaf_occupancy: usize,
    node_occupancy: usize,
    /// True until the root splits for the first time.
    is_root_leaf: bool,
    scan: Option<ScanState>,
}

impl BTreeIndex {
    /// Open the index for `relation_name`'s attribute at `attr_byte_offset`.
    ///
    /// The index file name is derived deterministically (see
    /// [`index_file_name`]). If the file does not exist yet, a fresh tree is
    /// built by scanning the whole relation and inserting every record's
    /// key; if it exists, its metadata must match the requested relation,
    /// offset, and type or the open fails with [`Error::BadIndexInfo`].
    pub fn open(
        relation_name: &str,
        buf_mgr: Arc<BufMgr>,
        attr_byte_offset: usize,
        attr_type: KeyType,
        relation: &mut dyn RelationScan,
    ) -> Result<Self> {
        let occupancies = (attr_type.leaf_occupancy(), attr_type.nonleaf_occupancy());
        Self::open_impl(
            relation_name,
            buf_mgr,
            attr_byte_offset,
            attr_type,
            relation,
            occupancies,
        )
    }

    /// `open` with explicit node occupancies. Tests shrink them to force
    /// deep trees with few insertions; the occupancies are an in-memory
    /// property of the handle, so a reopen must pass the same values.
    ///
    /// # Panics
    /// Panics on occupancies too small to split: a leaf split keeps
    /// `occupancy/2 + 1` entries plus possibly the incoming one on the left,
    /// which overflows the layout below 3; a non-leaf needs at least 2 keys
    /// for a non-degenerate half.
    fn open_impl(
        relation_name: &str,
        buf_mgr: Arc<BufMgr>,
        attr_byte_offset: usize,
        attr_type: KeyType,
        relation: &mut dyn RelationScan,
        (leaf_occupancy, node_occupancy): (usize, usize),
    ) -> Result<Self> {
        assert!(
            leaf_occupancy >= 3 && node_occupancy >= 2,
            "occupancies {leaf_occupancy}/{node_occupancy} too small to split"
        );
        let index_name = index_file_name(relation_name, attr_byte_offset);

        if Path::new(&index_name).exists() {
            Self::from_existing(
                relation_name,
                index_name,
                buf_mgr,
                attr_byte_offset,
                attr_type,
                leaf_occupancy,
                node_occupancy,
            )
        } else {
            Self::build_new(
                relation_name,
                index_name,
                buf_mgr,
                attr_byte_offset,
                attr_type,
                relation,
                leaf_occupancy,
                node_occupancy,
            )
        }
    }

    /// The relation name as stored in the metadata page (truncated).
    fn stored_name(relation_name: &str) -> String {
        let bytes = relation_name.as_bytes();
        let take = bytes.len().min(RELATION_NAME_LEN);
        String::from_utf8_lossy(&bytes[..take]).into_owned()
    }

    #[allow(clippy::too_many_arguments)]
    fn build_new(
        relation_name: &str,
        index_name: String,
        buf_mgr: Arc<BufMgr>,
        attr_byte_offset: usize,
        attr_type: KeyType,
        relation: &mut dyn RelationScan,
        leaf_occupancy: usize,
        node_occupancy: usize,
    ) -> Result<Self> {
        let file: FileRef = Arc::new(DiskFile::create(&index_name)?);

        let (header_no, header_handle) = buf_mgr.alloc_page(&file)?;
        debug_assert_eq!(header_no, HEADER_PAGE_NO);
        let (root_no, root_handle) = buf_mgr.alloc_page(&file)?;
        debug_assert_eq!(root_no, INITIAL_ROOT_PAGE_NO);

        let meta = IndexMetaInfo {
            relation_name: Self::stored_name(relation_name),
            attr_byte_offset: attr_byte_offset as u32,
            attr_type,
            root_page_no: root_no,
        };
        meta.write_to(&mut header_handle.write());
        buf_mgr.unpin_page(&file, header_no, true)?;

        // The root starts life as an empty leaf.
        LeafNode::new().write_to(&mut root_handle.write(), attr_type, leaf_occupancy);
        buf_mgr.unpin_page(&file, root_no, true)?;
        buf_mgr.flush_file(&file)?;

        let mut index = Self {
            buf_mgr,
            file,
            index_name,
            header_page_num: header_no,
            root_page_num: root_no,
            attr_type,
            leaf_occupancy,
            node_occupancy,
            is_root_leaf: true,
            scan: None,
        };

        // Bulk-load from the relation, one entry at a time in scan order.
        while let Some(rid) = relation.scan_next()? {
            let key = attr_type.extract(relation.get_record()?, attr_byte_offset)?;
            index.insert_entry(&key, rid)?;
        }
        Ok(index)
    }

    fn from_existing(
        relation_name: &str,
        index_name: String,
        buf_mgr: Arc<BufMgr>,
        attr_byte_offset: usize,
        attr_type: KeyType,
        leaf_occupancy: usize,
        node_occupancy: usize,
    ) -> Result<Self> {
        let file: FileRef = Arc::new(DiskFile::open(&index_name)?);

        let handle = buf_mgr.read_page(&file, HEADER_PAGE_NO)?;
        let meta = IndexMetaInfo::read_from(&handle.read(), &index_name);
        buf_mgr.unpin_page(&file, HEADER_PAGE_NO, false)?;
        let meta = meta?;

        if meta.relation_name != Self::stored_name(relation_name)
            || meta.attr_byte_offset as usize != attr_byte_offset
            || meta.attr_type != attr_type
        {
            return Err(Error::BadIndexInfo(index_name));
        }

        Ok(Self {
            buf_mgr,
            file,
            index_name,
            header_page_num: HEADER_PAGE_NO,
            root_page_num: meta.root_page_no,
            attr_type,
            leaf_occupancy,
            node_occupancy,
            is_root_leaf: meta.root_page_no == INITIAL_ROOT_PAGE_NO,
            scan: None,
        })
    }

    /// The name of the index file backing this tree.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// True until the first root split.
    pub fn root_is_leaf(&self) -> bool {
        self.is_root_leaf
    }

    /// Insert one `(key, rid)` entry. Duplicate keys are allowed; they keep
    /// insertion order among themselves.
    ///
    /// The whole file is flushed after each insert - a conservative
    /// durability policy, and the single call to relax if it ever needs to
    /// change.
    pub fn insert_entry(&mut self, key: &Key, rid: RecordId) -> Result<()> {
        self.check_key_type(key)?;
        let pool = Arc::clone(&self.buf_mgr);
        let file = FileRef::clone(&self.file);
        let root = self.root_page_num;

        // The root stays pinned across the whole insert so the recursion
        // can never lose it to eviction.
        pool.read_page(&file, root)?;

        let result = if self.is_root_leaf {
            self.insert_into_leaf(root, key, rid)
        } else {
            self.insert_into_nonleaf(root, key, rid)
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = pool.unpin_page(&file, root, false);
                return Err(e);
            }
        };

        if let InsertOutcome::Split {
            separator,
            new_page,
        } = outcome
        {
            if let Err(e) = self.create_new_root(root, new_page, separator) {
                let _ = pool.unpin_page(&file, root, false);
                return Err(e);
            }
        }

        pool.unpin_page(&file, root, true)?;
        pool.flush_file(&file)
    }

    fn check_key_type(&self, key: &Key) -> Result<()> {
        if key.key_type() != self.attr_type {
            return Err(Error::KeyTypeMismatch {
                expected: self.attr_type,
                found: key.key_type(),
            });
        }
        Ok(())
    }

    fn insert_into_leaf(&mut self, page_no: PageId, key: &Key, rid: RecordId) -> Result<InsertOutcome> {
        let pool = Arc::clone(&self.buf_mgr);
        let file = FileRef::clone(&self.file);

        let handle = pool.read_page(&file, page_no)?;
        let mut leaf = LeafNode::read_from(&handle.read(), self.attr_type, self.leaf_occupancy);

        if leaf.len() < self.leaf_occupancy {
            leaf.insert(*key, rid);
            leaf.write_to(&mut handle.write(), self.attr_type, self.leaf_occupancy);
            pool.unpin_page(&file, page_no, true)?;
            return Ok(InsertOutcome::NoSplit);
        }

        // Full: the upper half moves to a fresh right sibling.
        let (new_page_no, new_handle) = pool.alloc_page(&file)?;
        let mut right = leaf.split_off(self.leaf_occupancy / 2 + 1);

        // Inclusive boundary: a key equal to the split key stays left.
        let split_key = leaf.keys[leaf.len() - 1];
        if key.cmp(&split_key) != Ordering::Greater {
            leaf.insert(*key, rid);
        } else {
            right.insert(*key, rid);
        }

        // Thread the sibling chain through the new page.
        right.right_sib = leaf.right_sib;
        leaf.right_sib = new_page_no;

        // The separator is the last key kept in the left half; scans
        // descend left of an equal separator to still reach it.
        let separator = leaf.keys[leaf.len() - 1];

        right.write_to(&mut new_handle.write(), self.attr_type, self.leaf_occupancy);
        pool.unpin_page(&file, new_page_no, true)?;
        leaf.write_to(&mut handle.write(), self.attr_type, self.leaf_occupancy);
        pool.unpin_page(&file, page_no, true)?;

        Ok(InsertOutcome::Split {
            separator,
            new_page: new_page_no,
        })
    }

    fn insert_into_nonleaf(
        &mut self,
        page_no: PageId,
        key: &Key,
        rid: RecordId,
    ) -> Result<InsertOutcome> {
        let pool = Arc::clone(&self.buf_mgr);
        let file = FileRef::clone(&self.file);

        let handle = pool.read_page(&file, page_no)?;
        let mut node = NonLeafNode::read_from(&handle.read(), self.attr_type, self.node_occupancy);

        let child = node.choose_subtree(key);
        let outcome = if node.children_are_leaves() {
            self.insert_into_leaf(child, key, rid)
        } else {
            self.insert_into_nonleaf(child, key, rid)
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = pool.unpin_page(&file, page_no, false);
                return Err(e);
            }
        };

        let InsertOutcome::Split {
            separator,
            new_page,
        } = outcome
        else {
            pool.unpin_page(&file, page_no, false)?;
            return Ok(InsertOutcome::NoSplit);
        };

        if node.len() < self.node_occupancy {
            node.insert(separator, new_page);
            node.write_to(&mut handle.write(), self.attr_type, self.node_occupancy);
            pool.unpin_page(&file, page_no, true)?;
            return Ok(InsertOutcome::NoSplit);
        }

        // Full: split and carry the middle key up.
        let (new_no, new_handle) = pool.alloc_page(&file)?;
        let (promoted, right) = node.split_insert(separator, new_page);
        right.write_to(&mut new_handle.write(), self.attr_type, self.node_occupancy);
        pool.unpin_page(&file, new_no, true)?;
        node.write_to(&mut handle.write(), self.attr_type, self.node_occupancy);
        pool.unpin_page(&file, page_no, true)?;

        Ok(InsertOutcome::Split {
            separator: promoted,
            new_page: new_no,
        })
    }

    /// Put a new non-leaf root above a split pair and repoint the metadata.
    fn create_new_root(&mut self, left: PageId, right: PageId, separator: Key) -> Result<()> {
        let pool = Arc::clone(&self.buf_mgr);
        let file = FileRef::clone(&self.file);

        let (new_root, handle) = pool.alloc_page(&file)?;
        let level = if self.is_root_leaf { LEVEL_ABOVE_LEAVES } else { 0 };
        let node = NonLeafNode::with_children(level, separator, left, right);
        node.write_to(&mut handle.write(), self.attr_type, self.node_occupancy);
        pool.unpin_page(&file, new_root, true)?;

        self.root_page_num = new_root;
        self.is_root_leaf = false;

        let meta_handle = pool.read_page(&file, self.header_page_num)?;
        let meta = IndexMetaInfo::read_from(&meta_handle.read(), &self.index_name);
        match meta {
            Ok(mut meta) => {
                meta.root_page_no = new_root;
                meta.write_to(&mut meta_handle.write());
                pool.unpin_page(&file, self.header_page_num, true)
            }
            Err(e) => {
                let _ = pool.unpin_page(&file, self.header_page_num, false);
                Err(e)
            }
        }
    }

    /// Begin a range scan over `low lowOp .. high highOp`.
    ///
    /// A scan already in progress is ended first, before the new arguments
    /// are even looked at - a rejected `start_scan` leaves the index idle,
    /// not on the old cursor. The low bound must take
    /// [`ScanOp::Gt`]/[`ScanOp::Gte`] and the high bound
    /// [`ScanOp::Lt`]/[`ScanOp::Lte`], and `low` must not exceed `high`.
    pub fn start_scan(
        &mut self,
        low: &Key,
        low_op: ScanOp,
        high: &Key,
        high_op: ScanOp,
    ) -> Result<()> {
        if self.scan.is_some() {
            self.end_scan()?;
        }

        if !matches!(low_op, ScanOp::Gt | ScanOp::Gte)
            || !matches!(high_op, ScanOp::Lt | ScanOp::Lte)
        {
            return Err(Error::BadOpcodes);
        }
        self.check_key_type(low)?;
        self.check_key_type(high)?;
        if low.cmp(high) == Ordering::Greater {
            return Err(Error::BadScanRange);
        }

        let pool = Arc::clone(&self.buf_mgr);
        let file = FileRef::clone(&self.file);

        // Descend toward the leftmost leaf that can hold the low bound.
        let mut cur = self.root_page_num;
        if !self.is_root_leaf {
            loop {
                let handle = pool.read_page(&file, cur)?;
                let node =
                    NonLeafNode::read_from(&handle.read(), self.attr_type, self.node_occupancy);
                pool.unpin_page(&file, cur, false)?;

                cur = node.choose_scan_subtree(low);
                if node.children_are_leaves() {
                    break;
                }
            }
        }

        // Pin the leaf as the cursor anchor; it stays pinned until the scan
        // moves to a sibling or ends.
        let handle = pool.read_page(&file, cur)?;
        let leaf = LeafNode::read_from(&handle.read(), self.attr_type, self.leaf_occupancy);
        let next_entry = leaf.keys.partition_point(|k| !low_op.compare(k, low));

        self.scan = Some(ScanState {
            cur_page: cur,
            next_entry,
            high: *high,
            high_op,
        });
        Ok(())
    }

    /// The next qualifying record id, in ascending key order.
    ///
    /// Fails with [`Error::ScanCompleted`] - repeatably - once the range is
    /// exhausted, and [`Error::ScanNotInitialized`] with no active scan.
    pub fn scan_next(&mut self) -> Result<RecordId> {
        let pool = Arc::clone(&self.buf_mgr);
        let file = FileRef::clone(&self.file);
        let (attr_type, occupancy) = (self.attr_type, self.leaf_occupancy);
        let scan = self.scan.as_mut().ok_or(Error::ScanNotInitialized)?;

        loop {
            let handle = pool.read_page(&file, scan.cur_page)?;
            let leaf = LeafNode::read_from(&handle.read(), attr_type, occupancy);
            pool.unpin_page(&file, scan.cur_page, false)?;

            if scan.next_entry < leaf.len() {
                let key = leaf.keys[scan.next_entry];
                if !scan.high_op.compare(&key, &scan.high) {
                    return Err(Error::ScanCompleted);
                }
                let rid = leaf.rids[scan.next_entry];
                scan.next_entry += 1;
                return Ok(rid);
            }

            if !leaf.right_sib.is_valid() {
                return Err(Error::ScanCompleted);
            }

            // Hop to the right sibling, pinning it before releasing the old
            // anchor so the cursor always holds one resident page.
            pool.read_page(&file, leaf.right_sib)?;
            pool.unpin_page(&file, scan.cur_page, false)?;
            scan.cur_page = leaf.right_sib;
            scan.next_entry = 0;
        }
    }

    /// End the active scan, releasing the cursor's pin.
    pub fn end_scan(&mut self) -> Result<()> {
        let scan = self.scan.take().ok_or(Error::ScanNotInitialized)?;
        self.unpin_tolerant(scan.cur_page, false)
    }

    /// Unpin, treating "not pinned"/"not resident" as success. Teardown
    /// paths cannot know whether the last mutating call left the page
    /// pinned.
    fn unpin_tolerant(&self, page_no: PageId, dirty: bool) -> Result<()> {
        match self.buf_mgr.unpin_page(&self.file, page_no, dirty) {
            Ok(())
            | Err(Error::PageNotPinned { .. })
            | Err(Error::PageNotResident { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for BTreeIndex {
    /// Tear down: end any scan, release root/header pins if the last
    /// operation left them held, and flush the file. Failures are swallowed
    /// deliberately; destruction must not propagate.
    fn drop(&mut self) {
        if self.scan.is_some() {
            let _ = self.end_scan();
        }
        let _ = self.unpin_tolerant(self.root_page_num, true);
        let _ = self.unpin_tolerant(self.header_page_num, true);
        let _ = self.buf_mgr.flush_file(&self.file);
    }
}
