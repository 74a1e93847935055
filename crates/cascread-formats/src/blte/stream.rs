//! Lazy BLTE decoding
//!
//! [`BlteStream`] exposes the decompressed content of one BLTE record as a
//! [`Read`] + [`Seek`] stream. Chunks are pulled from the upstream reader
//! strictly in order and only when a read or seek needs bytes that have not
//! been decoded yet. Raw (`N`) chunks can be consumed partially.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use flate2::read::DeflateDecoder;
use md5::{Digest, Md5};
use tracing::trace;

use super::error::{BlteError, BlteResult};
use super::header::{BlteHeader, ChunkInfo};

/// Upper bound for a single inflated chunk of unknown size (1 GiB)
pub const MAX_DECOMPRESSION_SIZE: u64 = 1024 * 1024 * 1024;

/// Default limit for nested `F` frames
pub const DEFAULT_MAX_FRAME_DEPTH: u8 = 8;

/// When chunk data is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Materialization {
    /// Decode chunks on demand as reads and seeks need them
    #[default]
    Lazy,
    /// Decode every chunk while constructing the stream
    Eager,
}

/// Decoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Compare chunk MD5s against the chunk table
    pub verify_checksums: bool,
    /// Maximum nesting of `F` frames
    pub max_frame_depth: u8,
    /// Lazy or eager decoding
    pub materialization: Materialization,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            max_frame_depth: DEFAULT_MAX_FRAME_DEPTH,
            materialization: Materialization::Lazy,
        }
    }
}

impl DecodeOptions {
    /// Set the materialization mode
    #[must_use]
    pub const fn with_materialization(mut self, materialization: Materialization) -> Self {
        self.materialization = materialization;
        self
    }

    /// Enable or disable checksum verification
    #[must_use]
    pub const fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Set the frame depth limit
    #[must_use]
    pub const fn with_max_frame_depth(mut self, depth: u8) -> Self {
        self.max_frame_depth = depth;
        self
    }
}

/// Raw chunk that has been started but not fully consumed.
struct PartialChunk {
    index: usize,
    remaining: u64,
    hasher: Option<Md5>,
}

/// Seekable reader over the decompressed content of a BLTE record.
pub struct BlteStream<R: Read> {
    source: io::Chain<Cursor<Vec<u8>>, R>,
    header: BlteHeader,
    options: DecodeOptions,
    depth: u8,
    next_chunk: usize,
    partial: Option<PartialChunk>,
    buffer: Vec<u8>,
    position: u64,
    length: u64,
    exhausted: bool,
}

impl<R: Read> BlteStream<R> {
    /// Open a record with default options.
    ///
    /// `record_len` is the total size of the record including its header, if
    /// known.
    pub fn new(reader: R, record_len: Option<u64>) -> BlteResult<Self> {
        Self::with_options(reader, record_len, DecodeOptions::default())
    }

    /// Open a record with explicit options.
    pub fn with_options(reader: R, record_len: Option<u64>, options: DecodeOptions) -> BlteResult<Self> {
        Self::open_at_depth(reader, record_len, options, 0)
    }

    fn open_at_depth(
        mut reader: R,
        record_len: Option<u64>,
        options: DecodeOptions,
        depth: u8,
    ) -> BlteResult<Self> {
        if depth > options.max_frame_depth {
            return Err(BlteError::FrameDepthExceeded {
                depth,
                limit: options.max_frame_depth,
            });
        }

        let (header, prefetched) = BlteHeader::read(&mut reader, record_len)?;
        let length = header.total_decompressed_size();

        trace!(
            "opened BLTE record: {} chunk(s), {} bytes, depth {}",
            header.chunks.len(),
            length,
            depth
        );

        let mut stream = Self {
            source: Cursor::new(prefetched).chain(reader),
            header,
            options,
            depth,
            next_chunk: 0,
            partial: None,
            buffer: Vec::new(),
            position: 0,
            length,
            exhausted: false,
        };

        if options.materialization == Materialization::Eager {
            stream.fill_to(u64::MAX)?;
        }

        Ok(stream)
    }

    /// Total decompressed length.
    ///
    /// For single-chunk compressed records this is the payload size until
    /// the chunk has been decoded; [`Self::settle_length`] decodes it early.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Current read position
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Decode a single implicit chunk if it has not been started, so that
    /// [`Self::len`] is exact. Raw chunks are only peeked at.
    pub fn settle_length(&mut self) -> BlteResult<u64> {
        if self.header.is_single_chunk() && self.next_chunk == 0 {
            self.fill_to(1)?;
        }
        Ok(self.length)
    }

    /// Whether the decompressed content is empty
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Chunk size metadata
    pub fn chunks(&self) -> &[ChunkInfo] {
        &self.header.chunks
    }

    /// Parsed header
    pub fn header(&self) -> &BlteHeader {
        &self.header
    }

    /// Number of decompressed bytes currently buffered
    pub fn buffered(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Decode everything and return the content.
    ///
    /// Unlike [`Read`], running out of upstream data here is an error.
    pub fn decode_all(mut self) -> BlteResult<Vec<u8>> {
        self.fill_to(u64::MAX)?;
        let actual = self.buffer.len() as u64;
        if actual < self.length {
            return Err(BlteError::Truncated {
                expected: self.length,
                actual,
            });
        }
        Ok(self.buffer)
    }

    /// Decode chunks until at least `target` bytes are buffered, every chunk
    /// is done, or upstream runs dry.
    fn fill_to(&mut self, target: u64) -> BlteResult<()> {
        while (self.buffer.len() as u64) < target && !self.exhausted {
            if self.partial.is_some() {
                self.continue_raw(target)?;
            } else if self.next_chunk < self.header.chunks.len() {
                let index = self.next_chunk;
                self.next_chunk += 1;
                self.start_chunk(index, target)?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn start_chunk(&mut self, index: usize, target: u64) -> BlteResult<()> {
        let chunk = self.header.chunks[index];

        let mut mode = [0u8; 1];
        if !self.read_upstream(&mut mode)? {
            return Ok(());
        }

        trace!(
            "decoding chunk {} mode '{}' ({} -> {} bytes)",
            index,
            char::from(mode[0]),
            chunk.compressed_size,
            chunk.decompressed_size
        );

        let mut hasher = (self.options.verify_checksums && chunk.has_checksum()).then(|| {
            let mut hasher = Md5::new();
            hasher.update(mode);
            hasher
        });

        if mode[0] == b'N' {
            self.partial = Some(PartialChunk {
                index,
                remaining: u64::from(chunk.compressed_size),
                hasher,
            });
            return self.continue_raw(target);
        }

        let Some(payload) = self.read_payload(u64::from(chunk.compressed_size))? else {
            return Ok(());
        };
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&payload);
        }
        self.verify(index, hasher)?;

        let decoded = match mode[0] {
            b'Z' => self.inflate(index, &payload)?,
            b'F' => self.decode_frame(&payload)?,
            b'E' => return Err(BlteError::EncryptedChunk(index)),
            other => return Err(BlteError::UnknownChunkMode(other)),
        };

        self.finish_chunk(index, decoded.len() as u64)?;
        self.buffer.extend_from_slice(&decoded);
        if self.header.is_single_chunk() {
            self.length = self.buffer.len() as u64;
        }
        Ok(())
    }

    /// Copy raw bytes of the pending `N` chunk, no more than `target` needs.
    fn continue_raw(&mut self, target: u64) -> BlteResult<()> {
        let Some(mut partial) = self.partial.take() else {
            return Ok(());
        };

        let wanted = target.saturating_sub(self.buffer.len() as u64).max(1);
        let take = wanted.min(partial.remaining);
        let start = self.buffer.len();

        // Grows with the bytes actually delivered, not the declared size
        let result = self.source.by_ref().take(take).read_to_end(&mut self.buffer);
        let filled = (self.buffer.len() - start) as u64;

        if let Some(hasher) = partial.hasher.as_mut() {
            hasher.update(&self.buffer[start..]);
        }
        partial.remaining -= filled;

        if let Err(err) = result {
            self.partial = Some(partial);
            return Err(err.into());
        }

        if filled < take {
            self.exhausted = true;
            return Ok(());
        }

        if partial.remaining == 0 {
            self.verify(partial.index, partial.hasher)?;
            let produced = u64::from(self.header.chunks[partial.index].compressed_size);
            self.finish_chunk(partial.index, produced)?;
        } else {
            self.partial = Some(partial);
        }
        Ok(())
    }

    fn inflate(&self, index: usize, payload: &[u8]) -> BlteResult<Vec<u8>> {
        // Two-byte zlib header, then raw deflate
        let body = payload.get(2..).ok_or_else(|| {
            BlteError::DecompressionFailed(format!("chunk {index} too short for zlib header"))
        })?;

        let limit = if self.header.is_single_chunk() {
            MAX_DECOMPRESSION_SIZE
        } else {
            u64::from(self.header.chunks[index].decompressed_size)
        };

        let mut decoded = Vec::new();
        DeflateDecoder::new(body)
            .take(limit + 1)
            .read_to_end(&mut decoded)
            .map_err(|e| BlteError::DecompressionFailed(format!("chunk {index}: {e}")))?;

        if self.header.is_single_chunk() && decoded.len() as u64 > limit {
            return Err(BlteError::DecompressionFailed(format!(
                "chunk {index} exceeds {MAX_DECOMPRESSION_SIZE} bytes"
            )));
        }
        Ok(decoded)
    }

    fn decode_frame(&self, payload: &[u8]) -> BlteResult<Vec<u8>> {
        let options = self.options.with_materialization(Materialization::Eager);
        let depth = self
            .depth
            .checked_add(1)
            .ok_or(BlteError::FrameDepthExceeded {
                depth: self.depth,
                limit: options.max_frame_depth,
            })?;
        let nested = BlteStream::open_at_depth(payload, Some(payload.len() as u64), options, depth)?;
        nested.decode_all()
    }

    fn verify(&self, index: usize, hasher: Option<Md5>) -> BlteResult<()> {
        let Some(hasher) = hasher else {
            return Ok(());
        };
        let actual: [u8; 16] = hasher.finalize().into();
        let expected = self.header.chunks[index].checksum;
        if actual != expected {
            return Err(BlteError::ChecksumMismatch {
                chunk: index,
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }
        Ok(())
    }

    fn finish_chunk(&self, index: usize, produced: u64) -> BlteResult<()> {
        let expected = u64::from(self.header.chunks[index].decompressed_size);
        if !self.header.is_single_chunk() && produced != expected {
            return Err(BlteError::SizeMismatch {
                chunk: index,
                expected,
                actual: produced,
            });
        }
        Ok(())
    }

    /// Read `len` payload bytes. Returns `None` and marks the stream
    /// exhausted when upstream ends first.
    fn read_payload(&mut self, len: u64) -> BlteResult<Option<Vec<u8>>> {
        let mut payload = Vec::new();
        self.source.by_ref().take(len).read_to_end(&mut payload)?;
        if (payload.len() as u64) < len {
            trace!("upstream exhausted inside chunk {}", self.next_chunk - 1);
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(payload))
    }

    /// Fill `buf` from upstream. Returns `false` and marks the stream
    /// exhausted when upstream ends first.
    fn read_upstream(&mut self, buf: &mut [u8]) -> BlteResult<bool> {
        match self.source.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                trace!("upstream exhausted before chunk {}", self.next_chunk);
                self.exhausted = true;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<R: Read> Read for BlteStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.length {
            return Ok(0);
        }

        let want = self.position.saturating_add(buf.len() as u64).min(self.length);
        self.fill_to(want)?;

        let end = want.min(self.buffer.len() as u64).min(self.length);
        if self.position >= end {
            return Ok(0);
        }

        let start = self.position as usize;
        let count = (end - self.position) as usize;
        buf[..count].copy_from_slice(&self.buffer[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl<R: Read> Seek for BlteStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.settle_length()?.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        }
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;

        self.fill_to(target.min(self.length))?;
        self.position = target;
        Ok(target)
    }
}

impl<R: Read> std::fmt::Debug for BlteStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlteStream")
            .field("chunks", &self.header.chunks.len())
            .field("length", &self.length)
            .field("position", &self.position)
            .field("buffered", &self.buffer.len())
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
