//! Handle to one resolved file

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use cascread_crypto::EncodingKey;
use cascread_formats::blte::{BlteError, BlteStream, ChunkInfo};

use crate::Result;

/// Decompressed content of one file.
///
/// Behaves like [`std::fs::File`]: chunks are fetched and decoded on
/// demand as reads and seeks reach them. Dropping the handle releases the
/// underlying archive map or HTTP response.
pub struct CascFile {
    stream: BlteStream<Box<dyn Read + Send>>,
    encoding_key: EncodingKey,
}

impl CascFile {
    pub(crate) fn new(stream: BlteStream<Box<dyn Read + Send>>, encoding_key: EncodingKey) -> Self {
        Self { stream, encoding_key }
    }

    /// Decompressed length.
    ///
    /// Exact for records with a chunk table. A compressed single-chunk
    /// record reports its payload size until [`Self::settle_len`] or a
    /// read has decoded it.
    pub fn len(&self) -> u64 {
        self.stream.len()
    }

    /// Decode a pending single-chunk record and return the exact length.
    pub fn settle_len(&mut self) -> Result<u64> {
        Ok(self.stream.settle_length()?)
    }

    /// True for empty files
    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// Chunk table of the record
    pub fn chunks(&self) -> &[ChunkInfo] {
        self.stream.chunks()
    }

    /// Encoding key the file was read from.
    ///
    /// For local storages only the first nine bytes are significant.
    pub fn encoding_key(&self) -> EncodingKey {
        self.encoding_key
    }

    /// Read the remaining content into memory.
    ///
    /// Fails with [`BlteError::Truncated`] when the record ends before the
    /// declared length.
    pub fn read_all(self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.into_exact_reader()
            .read_to_end(&mut data)
            .map_err(BlteError::from_io)?;
        Ok(data)
    }

    /// Reader that reports an early end of the record as an error instead
    /// of a short read.
    pub(crate) fn into_exact_reader(self) -> ExactReader {
        ExactReader(self)
    }
}

/// [`CascFile`] reader that fails with [`BlteError::Truncated`] at an
/// early end of the record.
pub(crate) struct ExactReader(CascFile);

impl Read for ExactReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let stream = &mut self.0.stream;
        let count = stream.read(buf)?;
        if count == 0 && !buf.is_empty() {
            let expected = stream.len();
            let actual = stream.position();
            if actual < expected {
                return Err(BlteError::Truncated { expected, actual }.into());
            }
        }
        Ok(count)
    }
}

impl Read for CascFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Seek for CascFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.stream.seek(pos)
    }
}

impl fmt::Debug for CascFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascFile")
            .field("encoding_key", &self.encoding_key.to_hex())
            .field("len", &self.stream.len())
            .field("chunks", &self.stream.chunks().len())
            .finish()
    }
}
