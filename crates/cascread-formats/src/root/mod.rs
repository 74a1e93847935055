//! Root tables: names and file ids to content keys
//!
//! Root files are game specific. A [`RootDecoder`] turns the decoded root
//! blob into a lazy sequence of [`RootRecord`]s; the storage engine
//! consumes that sequence to build its lookup maps.
//!
//! [`WowRootDecoder`] handles the legacy World of Warcraft layout.

mod error;
mod wow;

pub use error::{RootError, RootResult};
pub use wow::{WowRootDecoder, WowRootRecords};

use std::io::Read;

use cascread_crypto::ContentKey;

/// One root table record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootRecord {
    /// Content key of this version of the file
    pub content_key: ContentKey,
    /// Stable hash of the file path
    pub name_hash: u64,
    /// Numeric file id
    pub file_data_id: u32,
}

/// Lazy, finite sequence of root records.
///
/// The sequence cannot be restarted. After the first error it yields
/// nothing more.
pub type RootRecords<'a> = Box<dyn Iterator<Item = RootResult<RootRecord>> + 'a>;

/// Game-specific root format.
pub trait RootDecoder: Send + Sync {
    /// Decode records from the root blob.
    fn decode<'a>(&self, reader: Box<dyn Read + 'a>) -> RootRecords<'a>;
}
