//! The index metadata page.

use crate::common::{Error, PageId, Result};
use crate::index::btree::key::KeyType;
use crate::storage::Page;

/// Maximum stored length of the relation name. Longer names are truncated.
pub const RELATION_NAME_LEN: usize = 20;

const OFFSET_NAME: usize = 0;
const OFFSET_ATTR_OFFSET: usize = RELATION_NAME_LEN;
const OFFSET_ATTR_TYPE: usize = OFFSET_ATTR_OFFSET + 4;
const OFFSET_ROOT: usize = OFFSET_ATTR_TYPE + 1;

/// Contents of page 1 of an index file.
///
/// Written when the index is built and rewritten whenever the root moves
/// (a root split). Read back at open time to validate that the file matches
/// the requested relation/attribute and to find the current root.
///
/// # Layout (29 bytes used, rest of the page zeroed)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       20    relation name (NUL padded)
/// 20      4     attribute byte offset (u32)
/// 24      1     attribute type tag
/// 25      4     root page id (u32)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetaInfo {
    pub relation_name: String,
    pub attr_byte_offset: u32,
    pub attr_type: KeyType,
    pub root_page_no: PageId,
}

impl IndexMetaInfo {
    /// Decode the metadata page. `file_name` only labels the error on a
    /// corrupt type tag.
    pub fn read_from(page: &Page, file_name: &str) -> Result<Self> {
        let data = page.as_slice();

        let name_bytes = &data[OFFSET_NAME..OFFSET_NAME + RELATION_NAME_LEN];
        let name_len = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(RELATION_NAME_LEN);
        let relation_name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

        let attr_byte_offset = u32::from_le_bytes([
            data[OFFSET_ATTR_OFFSET],
            data[OFFSET_ATTR_OFFSET + 1],
            data[OFFSET_ATTR_OFFSET + 2],
            data[OFFSET_ATTR_OFFSET + 3],
        ]);

        let attr_type = KeyType::from_tag(data[OFFSET_ATTR_TYPE])
            .ok_or_else(|| Error::BadIndexInfo(file_name.to_string()))?;

        let root_page_no = PageId::new(u32::from_le_bytes([
            data[OFFSET_ROOT],
            data[OFFSET_ROOT + 1],
            data[OFFSET_ROOT + 2],
            data[OFFSET_ROOT + 3],
        ]));

        Ok(Self {
            relation_name,
            attr_byte_offset,
            attr_type,
            root_page_no,
        })
    }

    /// Encode into the metadata page.
    pub fn write_to(&self, page: &mut Page) {
        page.reset();
        let data = page.as_mut_slice();

        let name = self.relation_name.as_bytes();
        let take = name.len().min(RELATION_NAME_LEN);
        data[OFFSET_NAME..OFFSET_NAME + take].copy_from_slice(&name[..take]);

        data[OFFSET_ATTR_OFFSET..OFFSET_ATTR_OFFSET + 4]
            .copy_from_slice(&self.attr_byte_offset.to_le_bytes());
        data[OFFSET_ATTR_TYPE] = self.attr_type.tag();
        data[OFFSET_ROOT..OFFSET_ROOT + 4].copy_from_slice(&self.root_page_no.0.to_le_bytes());
    }
}
