//! Encoding table: content key to encoding key candidates
//!
//! The encoding file starts with a 22-byte big-endian header, followed by
//! the ESpec string block, the content-key page index (32 bytes per page)
//! and the content-key pages themselves. Each page holds entries of
//!
//! ```text
//! key_count: u16 LE
//! file_size: u32 BE
//! content_key: [u8; 16]
//! encoding_keys: [[u8; ekey_hash_size]; key_count]
//! ```
//!
//! terminated by a zero `key_count` or the end of the page. The order of
//! encoding keys is their lookup priority.

mod error;

pub use error::{EncodingError, EncodingResult};

use std::collections::HashMap;
use std::io::Cursor;

use binrw::BinRead;
use cascread_crypto::{ContentKey, EncodingKey, INDEX_KEY_LEN};
use tracing::debug;

/// Size of the fixed header
pub const HEADER_SIZE: usize = 22;

/// Size of one page index entry (first key + MD5)
pub const PAGE_INDEX_ENTRY_SIZE: usize = 32;

/// Encoding file header (22 bytes)
#[derive(Debug, Clone, BinRead)]
#[br(big)]
pub struct EncodingHeader {
    /// Magic bytes: 'EN'
    pub magic: [u8; 2],
    /// Version (typically 1)
    pub version: u8,
    /// Size of content key hashes
    pub ckey_hash_size: u8,
    /// Size of encoding key hashes
    pub ekey_hash_size: u8,
    /// Content key page size in KB
    pub ckey_page_size_kb: u16,
    /// Encoding key page size in KB
    pub ekey_page_size_kb: u16,
    /// Number of content key pages
    pub ckey_page_count: u32,
    /// Number of encoding key pages
    pub ekey_page_count: u32,
    /// Flags (0)
    pub flags: u8,
    /// Size of the ESpec block following the header
    pub espec_block_size: u32,
}

/// How many encoding key bytes a table keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWidth {
    /// All 16 bytes
    Full,
    /// Only the nine bytes used by local indices; the rest are zeroed
    Truncated,
}

/// One encoded representation of a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingCandidate {
    /// Decoded file size recorded for the content
    pub size: u32,
    /// Encoding key
    pub key: EncodingKey,
}

/// Parsed encoding table.
#[derive(Debug, Clone, Default)]
pub struct EncodingTable {
    entries: HashMap<ContentKey, Vec<EncodingCandidate>>,
}

impl EncodingTable {
    /// Parse a decoded encoding file.
    pub fn parse(data: &[u8], width: KeyWidth) -> EncodingResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(EncodingError::Truncated {
                needed: HEADER_SIZE,
                available: data.len(),
            });
        }
        if &data[..2] != b"EN" {
            return Err(EncodingError::InvalidMagic([data[0], data[1]]));
        }

        let header = EncodingHeader::read(&mut Cursor::new(data))?;
        if header.ckey_hash_size != 16 {
            return Err(EncodingError::InvalidHashSize {
                field: "ckey_hash_size",
                value: header.ckey_hash_size,
            });
        }
        if !(INDEX_KEY_LEN as u8..=16).contains(&header.ekey_hash_size) {
            return Err(EncodingError::InvalidHashSize {
                field: "ekey_hash_size",
                value: header.ekey_hash_size,
            });
        }

        let page_size = usize::from(header.ckey_page_size_kb) * 1024;
        if page_size == 0 {
            return Err(EncodingError::InvalidPageSize(page_size));
        }

        let page_count = header.ckey_page_count as usize;
        let pages_start = HEADER_SIZE
            + header.espec_block_size as usize
            + PAGE_INDEX_ENTRY_SIZE * page_count;

        let mut table = Self::default();
        for page in 0..page_count {
            let start = pages_start + page * page_size;
            let end = start + page_size;
            let page_data = data.get(start..end).ok_or(EncodingError::Truncated {
                needed: end,
                available: data.len(),
            })?;
            table.parse_page(page, page_data, &header, width)?;
        }

        debug!(
            "parsed encoding table: {} pages, {} content keys",
            page_count,
            table.entries.len()
        );
        Ok(table)
    }

    fn parse_page(
        &mut self,
        page: usize,
        data: &[u8],
        header: &EncodingHeader,
        width: KeyWidth,
    ) -> EncodingResult<()> {
        let ekey_size = usize::from(header.ekey_hash_size);
        let kept = match width {
            KeyWidth::Full => ekey_size,
            KeyWidth::Truncated => INDEX_KEY_LEN,
        };

        let mut pos = 0;
        while pos + 2 <= data.len() {
            let key_count = usize::from(u16::from_le_bytes([data[pos], data[pos + 1]]));
            if key_count == 0 {
                break;
            }

            let entry_len = 2 + 4 + 16 + key_count * ekey_size;
            let entry = data
                .get(pos..pos + entry_len)
                .ok_or(EncodingError::PageOverrun { page, offset: pos })?;

            let size = u32::from_be_bytes([entry[2], entry[3], entry[4], entry[5]]);
            let mut ckey = [0u8; 16];
            ckey.copy_from_slice(&entry[6..22]);

            let candidates = self.entries.entry(ContentKey::from_bytes(ckey)).or_default();
            for raw in entry[22..].chunks_exact(ekey_size) {
                let mut ekey = [0u8; 16];
                ekey[..kept].copy_from_slice(&raw[..kept]);
                candidates.push(EncodingCandidate {
                    size,
                    key: EncodingKey::from_bytes(ekey),
                });
            }

            pos += entry_len;
        }
        Ok(())
    }

    /// Candidates for a content key in priority order
    pub fn lookup(&self, key: &ContentKey) -> Option<&[EncodingCandidate]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of content keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    type Entry = (u32, [u8; 16], Vec<[u8; 16]>);

    fn encoding_file(pages: &[Vec<Entry>], espec: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"EN");
        data.extend_from_slice(&[1, 16, 16]);
        data.extend_from_slice(&4u16.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes());
        data.extend_from_slice(&(pages.len() as u32).to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.push(0);
        data.extend_from_slice(&(espec.len() as u32).to_be_bytes());
        data.extend_from_slice(espec);
        data.extend(std::iter::repeat_n(0u8, 32 * pages.len()));
        for page in pages {
            let start = data.len();
            for (size, ckey, ekeys) in page {
                data.extend_from_slice(&(ekeys.len() as u16).to_le_bytes());
                data.extend_from_slice(&size.to_be_bytes());
                data.extend_from_slice(ckey);
                for ekey in ekeys {
                    data.extend_from_slice(ekey);
                }
            }
            data.resize(start + 4096, 0);
        }
        data
    }

    fn key(byte: u8) -> [u8; 16] {
        [byte; 16]
    }

    #[test]
    fn test_candidates_keep_file_order() {
        let data = encoding_file(
            &[
                vec![(10, key(1), vec![key(0xA1), key(0xA2)])],
                vec![(20, key(2), vec![key(0xB1)])],
            ],
            b"z,n\0",
        );
        let table = EncodingTable::parse(&data, KeyWidth::Full).unwrap();
        assert_eq!(table.len(), 2);

        let candidates = table.lookup(&ContentKey::from_bytes(key(1))).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].key, EncodingKey::from_bytes(key(0xA1)));
        assert_eq!(candidates[1].key, EncodingKey::from_bytes(key(0xA2)));
        assert_eq!(candidates[0].size, 10);

        let second = table.lookup(&ContentKey::from_bytes(key(2))).unwrap();
        assert_eq!(second[0].size, 20);
    }

    #[test]
    fn test_truncated_width_zeroes_tail() {
        let data = encoding_file(&[vec![(1, key(3), vec![key(0xC3)])]], &[]);
        let table = EncodingTable::parse(&data, KeyWidth::Truncated).unwrap();
        let candidate = table.lookup(&ContentKey::from_bytes(key(3))).unwrap()[0];

        let mut expected = [0u8; 16];
        expected[..9].copy_from_slice(&[0xC3; 9]);
        assert_eq!(candidate.key, EncodingKey::from_bytes(expected));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = encoding_file(&[], &[]);
        data[0] = b'X';
        assert!(matches!(
            EncodingTable::parse(&data, KeyWidth::Full),
            Err(EncodingError::InvalidMagic([b'X', b'N']))
        ));
    }

    #[test]
    fn test_missing_page_is_truncated() {
        let mut data = encoding_file(&[vec![(1, key(3), vec![key(4)])]], &[]);
        data.truncate(data.len() - 100);
        assert!(matches!(
            EncodingTable::parse(&data, KeyWidth::Full),
            Err(EncodingError::Truncated { .. })
        ));
    }
}
