//! In-memory root table built from a root decoder's records

use std::collections::HashMap;

use cascread_crypto::ContentKey;
use cascread_formats::root::{RootRecords, RootResult};

/// One version of a named file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootEntry {
    /// Content key of this version
    pub content_key: ContentKey,
    /// Numeric file id
    pub file_data_id: u32,
}

/// Name hash and file id lookups over the root records of a build.
///
/// Entries keep the order in which the decoder produced them.
#[derive(Debug, Clone, Default)]
pub struct RootTable {
    by_hash: HashMap<u64, Vec<RootEntry>>,
    by_id: HashMap<u32, Vec<ContentKey>>,
    records: usize,
}

impl RootTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a record sequence.
    ///
    /// Stops at the first decode error; records read before it are
    /// discarded together with the table.
    pub fn from_records(records: RootRecords<'_>) -> RootResult<Self> {
        let mut table = Self::new();
        for record in records {
            let record = record?;
            table.by_hash.entry(record.name_hash).or_default().push(RootEntry {
                content_key: record.content_key,
                file_data_id: record.file_data_id,
            });
            table
                .by_id
                .entry(record.file_data_id)
                .or_default()
                .push(record.content_key);
            table.records += 1;
        }
        Ok(table)
    }

    /// Entries recorded for a name hash, in decode order
    pub fn lookup_hash(&self, name_hash: u64) -> &[RootEntry] {
        self.by_hash.get(&name_hash).map_or(&[], Vec::as_slice)
    }

    /// Content keys recorded for a file id, in decode order
    pub fn lookup_id(&self, file_data_id: u32) -> &[ContentKey] {
        self.by_id.get(&file_data_id).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct name hashes
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    /// True if no records were decoded
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Total number of records, including repeated hashes
    pub fn record_count(&self) -> usize {
        self.records
    }
}
