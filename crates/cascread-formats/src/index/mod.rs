//! Index tables: truncated encoding key to archive location
//!
//! Two on-disk layouts feed the same table:
//!
//! - local `.idx` shards from an installation's `Data/data` directory
//! - CDN archive `.index` files, one per archive listed in the CDN config
//!
//! Both are keyed by the first nine bytes of an encoding key. When several
//! sources define the same key, the one merged last wins.

mod archive;
mod error;
mod local;

pub use archive::{ArchiveIndexFooter, FOOTER_SIZE, parse_archive_index};
pub use error::{IndexError, IndexResult};
pub use local::{LOCAL_RECORD_SIZE, parse_local_index};

use std::collections::HashMap;

use cascread_crypto::IndexKey;

/// Which index layout a byte source provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLayout {
    /// Local `.idx` shards
    Local,
    /// CDN archive `.index` files
    Archive,
}

/// Location of one BLTE record inside an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    /// Archive number (local `data.NNN`) or position in the CDN archive list
    pub archive_id: u16,
    /// Byte offset of the record
    pub offset: u64,
    /// Record size in bytes
    pub size: u32,
}

/// Lookup table built from one or more index files.
#[derive(Debug, Clone, Default)]
pub struct IndexTable {
    entries: HashMap<IndexKey, IndexEntry>,
}

impl IndexTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a local shard and merge it, replacing existing keys.
    ///
    /// Returns the number of records merged.
    pub fn merge_local(&mut self, data: &[u8]) -> IndexResult<usize> {
        let entries = parse_local_index(data)?;
        Ok(self.extend(entries))
    }

    /// Parse a CDN archive index and merge it, replacing existing keys.
    pub fn merge_archive(&mut self, data: &[u8], archive_id: u16) -> IndexResult<usize> {
        let entries = parse_archive_index(data, archive_id)?;
        Ok(self.extend(entries))
    }

    /// Parse with the given layout and merge.
    pub fn merge(&mut self, layout: IndexLayout, data: &[u8], archive_id: u16) -> IndexResult<usize> {
        match layout {
            IndexLayout::Local => self.merge_local(data),
            IndexLayout::Archive => self.merge_archive(data, archive_id),
        }
    }

    fn extend(&mut self, entries: Vec<(IndexKey, IndexEntry)>) -> usize {
        let count = entries.len();
        self.entries.extend(entries);
        count
    }

    /// Insert a single entry
    pub fn insert(&mut self, key: IndexKey, entry: IndexEntry) {
        self.entries.insert(key, entry);
    }

    /// Look up a truncated encoding key
    pub fn lookup(&self, key: &IndexKey) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
