//! Legacy World of Warcraft root layout
//!
//! The file is a sequence of blocks:
//!
//! ```text
//! record_count: u32 LE
//! content_flags: u32, locale_flags: u32   (ignored)
//! file_id_deltas: [u32 LE; record_count]
//! records: [(content_key: [u8; 16], name_hash: u64 LE); record_count]
//! ```
//!
//! File ids are delta coded within a block: `id = prev + delta`, then
//! `prev = id + 1`, starting from zero in each block.

use std::io::{self, Read};

use cascread_crypto::ContentKey;
use tracing::trace;

use super::error::{RootError, RootResult};
use super::{RootDecoder, RootRecord, RootRecords};

/// Decoder for the legacy WoW root layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct WowRootDecoder;

impl RootDecoder for WowRootDecoder {
    fn decode<'a>(&self, reader: Box<dyn Read + 'a>) -> RootRecords<'a> {
        Box::new(WowRootRecords::new(reader))
    }
}

/// Iterator over the records of a legacy WoW root file.
pub struct WowRootRecords<R: Read> {
    reader: R,
    block: usize,
    ids: Vec<u32>,
    next: usize,
    finished: bool,
}

impl<R: Read> WowRootRecords<R> {
    /// Start decoding from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            block: 0,
            ids: Vec::new(),
            next: 0,
            finished: false,
        }
    }

    /// Read the next block header and its file ids.
    ///
    /// Returns `Ok(false)` on a clean end of stream.
    fn read_block(&mut self) -> RootResult<bool> {
        let mut count = [0u8; 4];
        if !self.fill_or_eof(&mut count, "record count")? {
            return Ok(false);
        }
        let count = u32::from_le_bytes(count) as usize;

        let mut flags = [0u8; 8];
        self.fill(&mut flags, "block flags")?;

        let mut ids = Vec::with_capacity(count.min(1 << 16));
        let mut prev = 0u32;
        let mut delta = [0u8; 4];
        for _ in 0..count {
            self.fill(&mut delta, "file id deltas")?;
            let id = prev.wrapping_add(u32::from_le_bytes(delta));
            ids.push(id);
            prev = id.wrapping_add(1);
        }

        trace!("root block {}: {} records", self.block, count);
        self.ids = ids;
        self.next = 0;
        Ok(true)
    }

    fn read_record(&mut self) -> RootResult<RootRecord> {
        let mut raw = [0u8; 24];
        self.fill(&mut raw, "records")?;

        let mut ckey = [0u8; 16];
        ckey.copy_from_slice(&raw[..16]);
        let mut hash = [0u8; 8];
        hash.copy_from_slice(&raw[16..]);

        let record = RootRecord {
            content_key: ContentKey::from_bytes(ckey),
            name_hash: u64::from_le_bytes(hash),
            file_data_id: self.ids[self.next],
        };
        self.next += 1;
        if self.next == self.ids.len() {
            self.block += 1;
        }
        Ok(record)
    }

    fn fill(&mut self, buf: &mut [u8], context: &'static str) -> RootResult<()> {
        self.reader.read_exact(buf).map_err(|e| self.map_err(e, context))
    }

    /// Like [`Self::fill`], but a stream that ends before the first byte is
    /// a clean end.
    fn fill_or_eof(&mut self, buf: &mut [u8], context: &'static str) -> RootResult<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => {
                    return Err(RootError::Truncated {
                        block: self.block,
                        context,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    fn map_err(&self, err: io::Error, context: &'static str) -> RootError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            RootError::Truncated {
                block: self.block,
                context,
            }
        } else {
            RootError::Io(err)
        }
    }
}

impl<R: Read> Iterator for WowRootRecords<R> {
    type Item = RootResult<RootRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while self.next >= self.ids.len() {
            match self.read_block() {
                Ok(true) => {
                    if self.ids.is_empty() {
                        self.block += 1;
                    }
                }
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }

        let record = self.read_record();
        if record.is_err() {
            self.finished = true;
        }
        Some(record)
    }
}

impl<R: Read> std::iter::FusedIterator for WowRootRecords<R> {}
