//! Local installation backend
//!
//! Layout below the installation root:
//!
//! - `.build.info`: active build config hash
//! - `Data/config/ab/cd/<hash>`: build config
//! - `Data/data/XX*.idx`: index shards, one bucket per leading hex byte
//! - `Data/data/data.NNN`: archives of 30-byte record headers followed by
//!   BLTE records

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cascread_formats::config::BuildConfig;
use cascread_formats::index::{IndexEntry, IndexLayout};
use dashmap::DashMap;
use memmap2::{Mmap, MmapOptions};
use tracing::{debug, trace};

use crate::build_info::BuildInfo;
use crate::source::{ByteSource, IndexShard, RecordReader};
use crate::{BUILD_INFO_FILE, CONFIG_DIR, DATA_DIR, DEFAULT_DATA_DIR, Result, StorageError};

/// Size of the header preceding each record in a `data.NNN` archive.
pub const LOCAL_HEADER_SIZE: usize = 0x1E;

/// 30-byte header preceding each BLTE record in `.data` archives.
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0x00   | 16   | Encoding key (reversed byte order) |
/// | 0x10   | 4    | Size including this header (BE) |
/// | 0x14   | 2    | Flags |
/// | 0x16   | 4    | ChecksumA |
/// | 0x1A   | 4    | ChecksumB |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRecordHeader {
    /// Encoding key as stored (reversed)
    pub encoding_key: [u8; 16],
    /// Total size including this header
    pub size_with_header: u32,
    /// Flags
    pub flags: u16,
}

impl LocalRecordHeader {
    /// Parse from the first 30 bytes of a record.
    ///
    /// Returns `None` if the slice is too short.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let data = data.get(..LOCAL_HEADER_SIZE)?;
        let mut encoding_key = [0u8; 16];
        encoding_key.copy_from_slice(&data[..0x10]);
        Some(Self {
            encoding_key,
            size_with_header: u32::from_be_bytes([data[0x10], data[0x11], data[0x12], data[0x13]]),
            flags: u16::from_le_bytes([data[0x14], data[0x15]]),
        })
    }

    /// Encoding key in normal byte order
    pub fn encoding_key(&self) -> [u8; 16] {
        let mut key = self.encoding_key;
        key.reverse();
        key
    }
}

/// Reader over a byte range of a shared memory map.
struct MappedRange {
    map: Arc<Mmap>,
    pos: usize,
    end: usize,
}

impl Read for MappedRange {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = &self.map[self.pos..self.end];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.pos += count;
        Ok(count)
    }
}

/// Byte source over a local game installation.
pub struct LocalArchives {
    data_path: PathBuf,
    build_config: BuildConfig,
    index_buckets: u8,
    archives: DashMap<u16, Arc<Mmap>>,
}

impl LocalArchives {
    /// Open an installation root.
    ///
    /// Reads `.build.info` and the active build config.
    pub fn open(install_path: impl AsRef<Path>, index_buckets: u8) -> Result<Self> {
        let install_path = install_path.as_ref();
        let base = install_path.join(DEFAULT_DATA_DIR);

        let info = BuildInfo::from_path(&install_path.join(BUILD_INFO_FILE))?;
        let config_path = hashed_path(&base.join(CONFIG_DIR), &info.build_key)?;
        let build_config = BuildConfig::parse(&fs::read(&config_path)?)?;

        debug!(
            "local installation {} uses build config {}",
            install_path.display(),
            info.build_key
        );

        Ok(Self::from_parts(base.join(DATA_DIR), build_config, index_buckets))
    }

    /// Create from an already parsed build config and a `Data/data`
    /// directory.
    pub fn from_parts(data_path: impl Into<PathBuf>, build_config: BuildConfig, index_buckets: u8) -> Self {
        Self {
            data_path: data_path.into(),
            build_config,
            index_buckets,
            archives: DashMap::new(),
        }
    }

    /// Memory map of `data.NNN`, opened on first use.
    pub fn open_archive(&self, id: u16) -> Result<Arc<Mmap>> {
        if let Some(map) = self.archives.get(&id) {
            return Ok(Arc::clone(&map));
        }

        let path = self.data_path.join(format!("data.{id:03}"));
        let file = File::open(&path)
            .map_err(|e| StorageError::Archive(format!("Failed to open archive {}: {e}", path.display())))?;

        // Archives are append-only and never truncated while mapped
        #[allow(unsafe_code)]
        let map = unsafe {
            MmapOptions::new()
                .map(&file)
                .map_err(|e| StorageError::Archive(format!("Failed to mmap archive {}: {e}", path.display())))?
        };

        debug!("mapped archive {} ({} bytes)", path.display(), map.len());
        let map = Arc::new(map);
        Ok(Arc::clone(self.archives.entry(id).or_insert(map).value()))
    }

    /// Number of archives mapped so far
    pub fn mapped_archives(&self) -> usize {
        self.archives.len()
    }
}

impl ByteSource for LocalArchives {
    fn layout(&self) -> IndexLayout {
        IndexLayout::Local
    }

    fn build_config(&self) -> &BuildConfig {
        &self.build_config
    }

    fn index_shards(&self) -> Result<Vec<IndexShard>> {
        let mut names: Vec<String> = fs::read_dir(&self.data_path)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.to_ascii_lowercase().ends_with(".idx"))
            .collect();
        names.sort_by_key(|name| name.to_ascii_lowercase());

        let shards = (0..self.index_buckets)
            .filter_map(|bucket| {
                let prefix = format!("{bucket:02x}");
                names
                    .iter()
                    .rev()
                    .find(|name| name.to_ascii_lowercase().starts_with(&prefix))
                    .map(|name| IndexShard {
                        name: name.clone(),
                        archive_id: 0,
                    })
            })
            .collect();
        Ok(shards)
    }

    fn read_index_shard(&self, shard: &IndexShard) -> Result<Vec<u8>> {
        Ok(fs::read(self.data_path.join(&shard.name))?)
    }

    fn open_record(&self, entry: &IndexEntry) -> Result<RecordReader> {
        let map = self.open_archive(entry.archive_id)?;

        let start = usize::try_from(entry.offset)
            .map_err(|_| StorageError::Archive(format!("offset {} out of range", entry.offset)))?;
        let end = start + entry.size as usize;
        if entry.size as usize <= LOCAL_HEADER_SIZE || end > map.len() {
            return Err(StorageError::Archive(format!(
                "record {}+{} outside data.{:03} ({} bytes)",
                entry.offset,
                entry.size,
                entry.archive_id,
                map.len()
            )));
        }

        if let Some(header) = LocalRecordHeader::from_bytes(&map[start..end]) {
            if header.size_with_header != entry.size {
                trace!(
                    "record header of data.{:03}@{} claims {} bytes, index says {}",
                    entry.archive_id,
                    entry.offset,
                    header.size_with_header,
                    entry.size
                );
            }
        }

        let body_start = start + LOCAL_HEADER_SIZE;
        Ok(RecordReader::new(
            MappedRange {
                map,
                pos: body_start,
                end,
            },
            Some((end - body_start) as u64),
        ))
    }
}

impl std::fmt::Debug for LocalArchives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalArchives")
            .field("data_path", &self.data_path)
            .field("mapped_archives", &self.archives.len())
            .finish_non_exhaustive()
    }
}

/// `<dir>/ab/cd/<hash>` for a hex hash.
pub(crate) fn hashed_path(dir: &Path, hash: &str) -> Result<PathBuf> {
    let hash = hash.trim().to_ascii_lowercase();
    if hash.len() < 4 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StorageError::Setup(format!("invalid hash '{hash}'")));
    }
    Ok(dir.join(&hash[0..2]).join(&hash[2..4]).join(&hash))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_path() {
        let path = hashed_path(Path::new("/x"), "ABCDEF01").unwrap();
        assert_eq!(path, Path::new("/x/ab/cd/abcdef01"));
        assert!(hashed_path(Path::new("/x"), "zz").is_err());
    }

    #[test]
    fn test_record_header_parse() {
        let mut data = [0u8; LOCAL_HEADER_SIZE];
        for (i, byte) in data[..16].iter_mut().enumerate() {
            *byte = i as u8;
        }
        data[0x10..0x14].copy_from_slice(&100u32.to_be_bytes());

        let header = LocalRecordHeader::from_bytes(&data).unwrap();
        assert_eq!(header.size_with_header, 100);
        assert_eq!(header.encoding_key()[0], 15);
        assert!(LocalRecordHeader::from_bytes(&data[..10]).is_none());
    }
}
