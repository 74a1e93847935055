//! BLTE header and chunk table parsing
//!
//! The header is read from a plain [`Read`] so records can be decoded while
//! they are still arriving over the network. The chunk table itself is
//! buffered and parsed with `binrw`.

use std::io::{self, Cursor, Read};

use binrw::BinRead;

use super::error::{BlteError, BlteResult};

/// BLTE magic bytes
pub const BLTE_MAGIC: [u8; 4] = *b"BLTE";

/// Magic plus header size field
pub const PREAMBLE_SIZE: u64 = 8;

/// Header flags for chunk table format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeaderFlags {
    /// Standard chunk info (24 bytes per chunk)
    Standard = 0x0F,
    /// Extended chunk info (40 bytes per chunk)
    Extended = 0x10,
}

impl HeaderFlags {
    /// Parse from byte value
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0F => Some(Self::Standard),
            0x10 => Some(Self::Extended),
            _ => None,
        }
    }

    /// Get the size of each chunk info entry
    pub fn chunk_info_size(self) -> usize {
        match self {
            Self::Standard => 24,
            Self::Extended => 40,
        }
    }
}

/// Raw chunk table entry as stored on disk.
#[derive(BinRead, Debug, Clone)]
#[br(big, import(extended: bool))]
struct RawChunkInfo {
    compressed_size: u32,
    decompressed_size: u32,
    checksum: [u8; 16],
    #[br(if(extended))]
    _decompressed_checksum: Option<[u8; 16]>,
}

/// Size metadata of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Payload size on disk, excluding the one-byte mode tag
    pub compressed_size: u32,
    /// Size after decoding
    pub decompressed_size: u32,
    /// MD5 of mode tag plus payload; all zero when not recorded
    pub checksum: [u8; 16],
}

impl ChunkInfo {
    /// Whether a checksum was recorded for this chunk.
    pub fn has_checksum(&self) -> bool {
        self.checksum.iter().any(|&b| b != 0)
    }
}

/// Parsed BLTE header.
#[derive(Debug, Clone)]
pub struct BlteHeader {
    /// Header size field (0 = single implicit chunk)
    pub header_size: u32,
    /// Chunk table format, absent for single-chunk records
    pub flags: Option<HeaderFlags>,
    /// Chunks in stream order
    pub chunks: Vec<ChunkInfo>,
}

impl BlteHeader {
    /// Read a header from the start of a record.
    ///
    /// `record_len` is the total record size including the header. For a
    /// single-chunk record without a known length the rest of the reader is
    /// consumed to size the chunk; those bytes are returned so the caller
    /// can still decode them.
    pub fn read<R: Read>(reader: &mut R, record_len: Option<u64>) -> BlteResult<(Self, Vec<u8>)> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != BLTE_MAGIC {
            return Err(BlteError::InvalidMagic(magic));
        }

        let mut size = [0u8; 4];
        reader.read_exact(&mut size)?;
        let header_size = u32::from_be_bytes(size);

        if header_size == 0 {
            return Self::read_single(reader, record_len);
        }

        let mut table_head = [0u8; 4];
        reader.read_exact(&mut table_head)?;
        let flags = HeaderFlags::from_byte(table_head[0]).ok_or_else(|| {
            BlteError::InvalidHeader(format!("unknown chunk table flags 0x{:02X}", table_head[0]))
        })?;
        let chunk_count = u32::from_be_bytes([0, table_head[1], table_head[2], table_head[3]]);
        if chunk_count == 0 {
            return Err(BlteError::InvalidChunkCount(chunk_count));
        }

        let table_len = chunk_count as usize * flags.chunk_info_size();
        let declared_rest = u64::from(header_size).saturating_sub(PREAMBLE_SIZE + 4);
        if (table_len as u64) > declared_rest {
            return Err(BlteError::InvalidHeader(format!(
                "header size {header_size} too small for {chunk_count} chunks"
            )));
        }

        // Chunk table plus any trailing header bytes
        let mut table = Vec::new();
        reader.by_ref().take(declared_rest).read_to_end(&mut table)?;
        if (table.len() as u64) < declared_rest {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("header declares {declared_rest} bytes after the preamble, got {}", table.len()),
            )
            .into());
        }

        let extended = flags == HeaderFlags::Extended;
        let mut cursor = Cursor::new(&table[..table_len]);
        let mut chunks = Vec::with_capacity(chunk_count as usize);
        for index in 0..chunk_count as usize {
            let raw = RawChunkInfo::read_args(&mut cursor, (extended,))?;
            if raw.compressed_size == 0 {
                return Err(BlteError::EmptyChunk(index));
            }
            chunks.push(ChunkInfo {
                compressed_size: raw.compressed_size - 1,
                decompressed_size: raw.decompressed_size,
                checksum: raw.checksum,
            });
        }

        Ok((
            Self {
                header_size,
                flags: Some(flags),
                chunks,
            },
            Vec::new(),
        ))
    }

    fn read_single<R: Read>(reader: &mut R, record_len: Option<u64>) -> BlteResult<(Self, Vec<u8>)> {
        let (payload_len, prefetched) = match record_len {
            Some(len) => (len.checked_sub(PREAMBLE_SIZE + 1), Vec::new()),
            None => {
                let mut rest = Vec::new();
                reader.read_to_end(&mut rest)?;
                ((rest.len() as u64).checked_sub(1), rest)
            }
        };

        let payload_len = payload_len
            .and_then(|len| u32::try_from(len).ok())
            .ok_or_else(|| BlteError::InvalidHeader("single-chunk record has no payload".into()))?;

        let chunk = ChunkInfo {
            compressed_size: payload_len,
            decompressed_size: payload_len,
            checksum: [0; 16],
        };

        Ok((
            Self {
                header_size: 0,
                flags: None,
                chunks: vec![chunk],
            },
            prefetched,
        ))
    }

    /// Whether this record has an implicit single chunk
    pub fn is_single_chunk(&self) -> bool {
        self.header_size == 0
    }

    /// Sum of declared decompressed sizes
    pub fn total_decompressed_size(&self) -> u64 {
        self.chunks
            .iter()
            .map(|chunk| u64::from(chunk.decompressed_size))
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn multi_chunk_header(flags: u8, entries: &[(u32, u32)]) -> Vec<u8> {
        let entry_size = if flags == 0x10 { 40 } else { 24 };
        let header_size = 12 + entries.len() * entry_size;
        let mut data = Vec::new();
        data.extend_from_slice(b"BLTE");
        data.extend_from_slice(&(header_size as u32).to_be_bytes());
        data.push(flags);
        data.extend_from_slice(&(entries.len() as u32).to_be_bytes()[1..]);
        for &(compressed, decompressed) in entries {
            data.extend_from_slice(&compressed.to_be_bytes());
            data.extend_from_slice(&decompressed.to_be_bytes());
            data.extend_from_slice(&[0u8; 16]);
            if flags == 0x10 {
                data.extend_from_slice(&[0xAAu8; 16]);
            }
        }
        data
    }

    #[test]
    fn test_standard_chunk_table() {
        let data = multi_chunk_header(0x0F, &[(6, 5), (11, 100)]);
        let (header, prefetched) = BlteHeader::read(&mut data.as_slice(), None).unwrap();

        assert!(prefetched.is_empty());
        assert_eq!(header.flags, Some(HeaderFlags::Standard));
        assert_eq!(header.chunks.len(), 2);
        assert_eq!(header.chunks[0].compressed_size, 5);
        assert_eq!(header.chunks[1].decompressed_size, 100);
        assert_eq!(header.total_decompressed_size(), 105);
    }

    #[test]
    fn test_extended_chunk_table() {
        let data = multi_chunk_header(0x10, &[(3, 2)]);
        let (header, _) = BlteHeader::read(&mut data.as_slice(), None).unwrap();
        assert_eq!(header.flags, Some(HeaderFlags::Extended));
        assert_eq!(header.chunks[0].compressed_size, 2);
        assert!(!header.chunks[0].has_checksum());
    }

    #[test]
    fn test_zero_compressed_size_rejected() {
        let data = multi_chunk_header(0x0F, &[(4, 3), (0, 0)]);
        let err = BlteHeader::read(&mut data.as_slice(), None).unwrap_err();
        assert!(matches!(err, BlteError::EmptyChunk(1)));
    }

    #[test]
    fn test_zero_chunk_count_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(b"BLTE");
        data.extend_from_slice(&12u32.to_be_bytes());
        data.extend_from_slice(&[0x0F, 0, 0, 0]);
        let err = BlteHeader::read(&mut data.as_slice(), None).unwrap_err();
        assert!(matches!(err, BlteError::InvalidChunkCount(0)));
    }

    #[test]
    fn test_oversized_header_size_is_short_read() {
        let mut data = multi_chunk_header(0x0F, &[(6, 5)]);
        data[4..8].copy_from_slice(&0xFFFF_FFF0u32.to_be_bytes());
        let err = BlteHeader::read(&mut data.as_slice(), None).unwrap_err();
        match err {
            BlteError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected a short read, got {other}"),
        }
    }

    #[test]
    fn test_bad_magic() {
        let data = b"BLTF\0\0\0\0Nabc";
        let err = BlteHeader::read(&mut data.as_slice(), None).unwrap_err();
        assert!(matches!(err, BlteError::InvalidMagic(magic) if &magic == b"BLTF"));
    }

    #[test]
    fn test_single_chunk_sizes_from_record_length() {
        let data = b"BLTE\0\0\0\0Nhello";
        let (header, prefetched) =
            BlteHeader::read(&mut data.as_slice(), Some(data.len() as u64)).unwrap();
        assert!(header.is_single_chunk());
        assert!(prefetched.is_empty());
        assert_eq!(header.chunks[0].compressed_size, 5);
        assert_eq!(header.chunks[0].decompressed_size, 5);
    }

    #[test]
    fn test_single_chunk_without_length_prefetches_body() {
        let data = b"BLTE\0\0\0\0Nhello";
        let (header, prefetched) = BlteHeader::read(&mut data.as_slice(), None).unwrap();
        assert_eq!(header.chunks[0].compressed_size, 5);
        assert_eq!(prefetched, b"Nhello");
    }
}
