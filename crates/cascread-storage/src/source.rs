//! Byte source capability shared by the local and remote backends

use std::fmt;
use std::io::Read;

use cascread_crypto::EncodingKey;
use cascread_formats::config::BuildConfig;
use cascread_formats::index::{IndexEntry, IndexLayout};

use crate::Result;

/// One index file a byte source can provide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexShard {
    /// File name, used in logs and errors
    pub name: String,
    /// Archive id the entries belong to (archive indices only)
    pub archive_id: u16,
}

/// Reader over the BLTE bytes of one record.
pub struct RecordReader {
    reader: Box<dyn Read + Send>,
    len: Option<u64>,
}

impl RecordReader {
    /// Wrap a reader; `len` is the record size if known.
    pub fn new(reader: impl Read + Send + 'static, len: Option<u64>) -> Self {
        Self {
            reader: Box::new(reader),
            len,
        }
    }

    /// Record size, if known
    pub fn len(&self) -> Option<u64> {
        self.len
    }

    /// Split into the reader and its length
    pub fn into_parts(self) -> (Box<dyn Read + Send>, Option<u64>) {
        (self.reader, self.len)
    }
}

impl fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordReader")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Where the resolution engine gets its bytes from.
///
/// Implementations must be usable from several threads at once; every
/// opened record gets its own reader.
pub trait ByteSource: Send + Sync {
    /// Layout of the index files this source provides
    fn layout(&self) -> IndexLayout;

    /// Build configuration naming the encoding and root files
    fn build_config(&self) -> &BuildConfig;

    /// Index files to load, in merge order
    fn index_shards(&self) -> Result<Vec<IndexShard>>;

    /// Raw bytes of one index file
    fn read_index_shard(&self, shard: &IndexShard) -> Result<Vec<u8>>;

    /// Open the BLTE bytes of an indexed record
    fn open_record(&self, entry: &IndexEntry) -> Result<RecordReader>;

    /// Open a record stored outside any archive.
    ///
    /// Returns `Ok(None)` when the source has no such record.
    fn open_loose(&self, _key: &EncodingKey) -> Result<Option<RecordReader>> {
        Ok(None)
    }
}
