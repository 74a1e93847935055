//! Local `.idx` shard parsing
//!
//! Layout (all offsets from the start of the file):
//!
//! - `u32 LE` header length, `u32` header hash, header body
//! - data block aligned to 16 bytes at `(8 + header_length + 0x0F) & !0x0F`:
//!   `u32 LE` data length, `u32` hash, then `data_length / 18` records
//!
//! Each 18-byte record is a truncated key, a packed archive location and a
//! little-endian size.

use std::io::Cursor;

use binrw::io::{Read, Seek};
use binrw::{BinRead, BinReaderExt, BinResult, Endian};
use cascread_crypto::IndexKey;

use super::IndexEntry;
use super::error::{IndexError, IndexResult};

/// Size of one record in the data block
pub const LOCAL_RECORD_SIZE: usize = 18;

#[derive(BinRead, Debug)]
#[br(little)]
struct BlockHeader {
    length: u32,
    _hash: u32,
}

/// Archive id and offset packed into five bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArchiveLocation {
    archive_id: u16,
    offset: u32,
}

/// High byte of the archive id, then a big-endian word holding the two low
/// id bits and a 30-bit offset.
fn parse_archive_location<R: Read + Seek>(
    reader: &mut R,
    _endian: Endian,
    _args: (),
) -> BinResult<ArchiveLocation> {
    let index_high = u16::from(reader.read_be::<u8>()?);
    let index_low = reader.read_be::<u32>()?;

    Ok(ArchiveLocation {
        archive_id: (index_high << 2) | (index_low >> 30) as u16,
        offset: index_low & 0x3FFF_FFFF,
    })
}

#[derive(BinRead, Debug)]
#[br(big)]
struct LocalRecord {
    key: IndexKey,
    #[br(parse_with = parse_archive_location)]
    location: ArchiveLocation,
    #[br(little)]
    size: u32,
}

/// Parse one local shard into `(key, entry)` pairs in file order.
///
/// Padding records (all-zero keys) are dropped.
pub fn parse_local_index(data: &[u8]) -> IndexResult<Vec<(IndexKey, IndexEntry)>> {
    let mut cursor = Cursor::new(data);
    let header = BlockHeader::read(&mut cursor).map_err(|_| truncated(8, data))?;

    let data_start = (8 + u64::from(header.length) + 0x0F) & !0x0F;
    if data_start + 8 > data.len() as u64 {
        return Err(truncated(data_start + 8, data));
    }

    cursor.set_position(data_start);
    let block = BlockHeader::read(&mut cursor)?;

    let record_count = block.length as usize / LOCAL_RECORD_SIZE;
    let needed = data_start + 8 + (record_count * LOCAL_RECORD_SIZE) as u64;
    if needed > data.len() as u64 {
        return Err(truncated(needed, data));
    }

    let mut entries = Vec::with_capacity(record_count);
    for _ in 0..record_count {
        let record = LocalRecord::read(&mut cursor)?;
        if record.key.is_padding() {
            continue;
        }
        entries.push((
            record.key,
            IndexEntry {
                archive_id: record.location.archive_id,
                offset: u64::from(record.location.offset),
                size: record.size,
            },
        ));
    }

    Ok(entries)
}

fn truncated(needed: u64, data: &[u8]) -> IndexError {
    IndexError::Truncated {
        needed,
        available: data.len() as u64,
    }
}
