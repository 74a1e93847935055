//! CDN archive `.index` parsing
//!
//! An archive index is a run of 4 KiB pages holding fixed-size records
//! (`key`, `size: u32 BE`, `offset: u32 BE`), followed by a table of
//! contents (last key and hash of every page) and a 28-byte footer.
//! Pages are zero-padded; an all-zero key means the rest of the page is
//! empty.

use std::io::Cursor;

use binrw::BinRead;
use cascread_crypto::IndexKey;

use super::IndexEntry;
use super::error::{IndexError, IndexResult};

/// Size of the footer with 8-byte hashes
pub const FOOTER_SIZE: usize = 28;

/// Archive index footer.
#[derive(BinRead, Debug, Clone, PartialEq, Eq)]
#[br(little)]
pub struct ArchiveIndexFooter {
    /// Truncated MD5 of the table of contents
    pub toc_hash: [u8; 8],
    /// Format version
    pub version: u8,
    /// Reserved
    pub reserved: [u8; 2],
    /// Page size in KiB
    pub page_size_kb: u8,
    /// Width of the offset field
    pub offset_bytes: u8,
    /// Width of the size field
    pub size_bytes: u8,
    /// Width of the key field
    pub key_bytes: u8,
    /// Width of page and footer hashes
    pub hash_bytes: u8,
    /// Number of records (little-endian on disk)
    pub element_count: u32,
    /// Truncated MD5 of the footer
    pub footer_hash: [u8; 8],
}

impl ArchiveIndexFooter {
    /// Read the footer from the end of an index file
    pub fn from_index(data: &[u8]) -> IndexResult<Self> {
        let start = data.len().checked_sub(FOOTER_SIZE).ok_or(IndexError::Truncated {
            needed: FOOTER_SIZE as u64,
            available: data.len() as u64,
        })?;
        let footer = Self::read(&mut Cursor::new(&data[start..]))?;
        footer.validate()?;
        Ok(footer)
    }

    fn validate(&self) -> IndexResult<()> {
        if !(9..=16).contains(&self.key_bytes) {
            return Err(IndexError::InvalidFooter(format!(
                "key width {} outside 9..=16",
                self.key_bytes
            )));
        }
        if self.size_bytes != 4 || self.offset_bytes != 4 {
            return Err(IndexError::InvalidFooter(format!(
                "unsupported field widths: size {}, offset {}",
                self.size_bytes, self.offset_bytes
            )));
        }
        if self.page_size_kb == 0 {
            return Err(IndexError::InvalidFooter("page size of zero".into()));
        }
        Ok(())
    }

    /// Page size in bytes
    pub fn page_size(&self) -> usize {
        usize::from(self.page_size_kb) * 1024
    }

    /// Size of one record
    pub fn record_size(&self) -> usize {
        usize::from(self.key_bytes) + usize::from(self.size_bytes) + usize::from(self.offset_bytes)
    }

    /// Number of data pages in a file of `file_len` bytes
    pub fn page_count(&self, file_len: usize) -> usize {
        let per_page = self.page_size() + usize::from(self.key_bytes) + usize::from(self.hash_bytes);
        file_len.saturating_sub(FOOTER_SIZE) / per_page
    }
}

/// Parse an archive index into `(key, entry)` pairs in file order.
pub fn parse_archive_index(data: &[u8], archive_id: u16) -> IndexResult<Vec<(IndexKey, IndexEntry)>> {
    let footer = ArchiveIndexFooter::from_index(data)?;
    let page_size = footer.page_size();
    let record_size = footer.record_size();
    let key_bytes = usize::from(footer.key_bytes);
    let data_end = footer.page_count(data.len()) * page_size;
    let wanted = footer.element_count as usize;

    let mut entries = Vec::with_capacity(wanted.min(data_end / record_size));
    let mut pos = 0;
    while entries.len() < wanted && pos + record_size <= data_end {
        let record = &data[pos..pos + record_size];
        pos += record_size;

        let Some(key) = IndexKey::from_prefix(record) else {
            break;
        };
        if key.is_padding() {
            if pos % page_size != 0 {
                pos = pos.next_multiple_of(page_size);
            }
            continue;
        }

        let size = read_be_u32(&record[key_bytes..key_bytes + 4]);
        let offset = read_be_u32(&record[key_bytes + 4..key_bytes + 8]);
        entries.push((
            key,
            IndexEntry {
                archive_id,
                offset: u64::from(offset),
                size,
            },
        ));
    }

    Ok(entries)
}

fn read_be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
