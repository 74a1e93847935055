//! Lookup chain from encoding keys to open files
//!
//! Every open operation ends here: encoding keys are truncated to index
//! keys, looked up in the merged index, and the first record that can be
//! fetched is wrapped in a lazy BLTE stream.

use cascread_crypto::EncodingKey;
use cascread_formats::blte::{BlteError, BlteStream, DecodeOptions};
use cascread_formats::encoding::EncodingCandidate;
use cascread_formats::index::IndexTable;
use tracing::{debug, trace};

use crate::file::CascFile;
use crate::source::{ByteSource, RecordReader};
use crate::{Result, StorageError};

/// Resolves encoding keys against one byte source and index.
pub(crate) struct Resolver<'a> {
    source: &'a dyn ByteSource,
    index: &'a IndexTable,
    options: DecodeOptions,
    allow_loose: bool,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(source: &'a dyn ByteSource, index: &'a IndexTable, options: DecodeOptions) -> Self {
        Self {
            source,
            index,
            options,
            allow_loose: false,
        }
    }

    /// Also try records stored outside the archives.
    ///
    /// Used for the encoding and root files, which CDNs serve loose.
    pub(crate) fn with_loose_records(mut self) -> Self {
        self.allow_loose = true;
        self
    }

    /// Open the first candidate that resolves.
    ///
    /// Transport failures move on to the next candidate; a malformed BLTE
    /// header is returned as an error.
    pub(crate) fn open_candidates(&self, candidates: &[EncodingCandidate]) -> Result<Option<CascFile>> {
        for candidate in candidates {
            if let Some(file) = self.open_encoding_key(&candidate.key)? {
                return Ok(Some(file));
            }
        }
        Ok(None)
    }

    /// Open one encoding key.
    ///
    /// `Ok(None)` when the key is not indexed or its record could not be
    /// fetched.
    pub(crate) fn open_encoding_key(&self, key: &EncodingKey) -> Result<Option<CascFile>> {
        let Some(record) = self.fetch(key) else {
            return Ok(None);
        };

        let (reader, len) = record.into_parts();
        match BlteStream::with_options(reader, len, self.options) {
            Ok(stream) => Ok(Some(CascFile::new(stream, *key))),
            Err(BlteError::Io(err)) => {
                debug!("reading BLTE header of {} failed: {}", key, err);
                Ok(None)
            }
            Err(err) => Err(StorageError::Blte(err)),
        }
    }

    fn fetch(&self, key: &EncodingKey) -> Option<RecordReader> {
        if let Some(entry) = self.index.lookup(&key.truncated()) {
            match self.source.open_record(entry) {
                Ok(record) => return Some(record),
                Err(err) => {
                    debug!(
                        "fetching {} from archive {} at {} failed: {}",
                        key, entry.archive_id, entry.offset, err
                    );
                    return None;
                }
            }
        }

        if !self.allow_loose {
            trace!("{} is not indexed", key);
            return None;
        }

        match self.source.open_loose(key) {
            Ok(Some(record)) => {
                debug!("{} served as a loose record", key);
                Some(record)
            }
            Ok(None) => {
                trace!("{} is neither indexed nor loose", key);
                None
            }
            Err(err) => {
                debug!("fetching loose record {} failed: {}", key, err);
                None
            }
        }
    }
}
