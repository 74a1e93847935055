//! Synthetic builds for storage integration tests
//!
//! A [`Catalog`] collects files, turns them into BLTE records and produces
//! the encoding file, root file and build config of a small build. The
//! result can be laid out as a local installation or served as a CDN.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use cascread_crypto::name_hash;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use md5::{Digest, Md5};
use tempfile::TempDir;

pub type Key = [u8; 16];

pub fn md5(data: &[u8]) -> Key {
    let mut key = [0u8; 16];
    key.copy_from_slice(&Md5::digest(data));
    key
}

pub fn hex(key: &Key) -> String {
    hex::encode(key)
}

/// BLTE record with one chunk per `chunk_size` bytes of content,
/// alternating raw and zlib chunks.
pub fn blte_record(content: &[u8], chunk_size: usize) -> Vec<u8> {
    let encoded: Vec<(u8, Vec<u8>, usize)> = content
        .chunks(chunk_size.max(1))
        .enumerate()
        .map(|(i, chunk)| {
            if i % 2 == 1 {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(chunk).unwrap();
                (b'Z', encoder.finish().unwrap(), chunk.len())
            } else {
                (b'N', chunk.to_vec(), chunk.len())
            }
        })
        .collect();

    let mut record = Vec::new();
    record.extend_from_slice(b"BLTE");
    record.extend_from_slice(&((12 + 24 * encoded.len()) as u32).to_be_bytes());
    record.push(0x0F);
    record.extend_from_slice(&(encoded.len() as u32).to_be_bytes()[1..]);
    for (mode, payload, size) in &encoded {
        record.extend_from_slice(&(payload.len() as u32 + 1).to_be_bytes());
        record.extend_from_slice(&(*size as u32).to_be_bytes());
        let mut hasher = Md5::new();
        hasher.update([*mode]);
        hasher.update(payload);
        record.extend_from_slice(&hasher.finalize());
    }
    for (mode, payload, _) in &encoded {
        record.push(*mode);
        record.extend_from_slice(payload);
    }
    record
}

/// Single-chunk BLTE record without a chunk table.
pub fn blte_single(content: &[u8]) -> Vec<u8> {
    let mut record = Vec::new();
    record.extend_from_slice(b"BLTE");
    record.extend_from_slice(&0u32.to_be_bytes());
    record.push(b'N');
    record.extend_from_slice(content);
    record
}

/// Encoding file with a single 4 KiB content-key page.
pub fn encoding_file(entries: &[(u32, Key, Vec<Key>)]) -> Vec<u8> {
    let espec = b"n\0";
    let mut data = Vec::new();
    data.extend_from_slice(b"EN");
    data.extend_from_slice(&[1, 16, 16]);
    data.extend_from_slice(&4u16.to_be_bytes());
    data.extend_from_slice(&4u16.to_be_bytes());
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes());
    data.push(0);
    data.extend_from_slice(&(espec.len() as u32).to_be_bytes());
    data.extend_from_slice(espec);
    data.extend_from_slice(&[0u8; 32]);

    let start = data.len();
    for (size, ckey, ekeys) in entries {
        data.extend_from_slice(&(ekeys.len() as u16).to_le_bytes());
        data.extend_from_slice(&size.to_be_bytes());
        data.extend_from_slice(ckey);
        for ekey in ekeys {
            data.extend_from_slice(ekey);
        }
    }
    assert!(data.len() - start <= 4096, "encoding fixture overflows its page");
    data.resize(start + 4096, 0);
    data
}

/// Legacy WoW root file; each block is a list of `(file id, content key,
/// name hash)` with ascending ids.
pub fn wow_root(blocks: &[Vec<(u32, Key, u64)>]) -> Vec<u8> {
    let mut data = Vec::new();
    for block in blocks {
        data.extend_from_slice(&(block.len() as u32).to_le_bytes());
        data.extend_from_slice(&[0u8; 8]);
        let mut prev = 0u32;
        for (id, _, _) in block {
            data.extend_from_slice(&(id - prev).to_le_bytes());
            prev = id + 1;
        }
        for (_, ckey, hash) in block {
            data.extend_from_slice(ckey);
            data.extend_from_slice(&hash.to_le_bytes());
        }
    }
    data
}

/// Local `.idx` shard.
pub fn local_shard(records: &[([u8; 9], u16, u32, u32)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&0x10u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&[0u8; 0x10]);
    data.resize(32, 0);
    data.extend_from_slice(&((records.len() * 18) as u32).to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    for (key, archive, offset, size) in records {
        data.extend_from_slice(key);
        data.push((archive >> 2) as u8);
        let low = (u32::from(archive & 3) << 30) | offset;
        data.extend_from_slice(&low.to_be_bytes());
        data.extend_from_slice(&size.to_le_bytes());
    }
    data
}

/// CDN archive `.index` with one 4 KiB page.
pub fn archive_index(records: &[(Key, u32, u32)]) -> Vec<u8> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|(key, _, _)| *key);

    let mut data = Vec::new();
    for (key, size, offset) in &sorted {
        data.extend_from_slice(key);
        data.extend_from_slice(&size.to_be_bytes());
        data.extend_from_slice(&offset.to_be_bytes());
    }
    assert!(data.len() <= 4096, "index fixture overflows its page");
    data.resize(4096, 0);
    data.extend_from_slice(&sorted.last().map_or([0u8; 16], |(key, _, _)| *key));
    data.extend_from_slice(&[0u8; 8]);
    data.extend_from_slice(&[0u8; 8]);
    data.extend_from_slice(&[1, 0, 0, 4, 4, 4, 16, 8]);
    data.extend_from_slice(&(sorted.len() as u32).to_le_bytes());
    data.extend_from_slice(&[0u8; 8]);
    data
}

pub fn truncated(key: &Key) -> [u8; 9] {
    let mut short = [0u8; 9];
    short.copy_from_slice(&key[..9]);
    short
}

/// Files of a synthetic build.
#[derive(Debug, Default)]
pub struct Catalog {
    records: Vec<(Key, Vec<u8>)>,
    encoding: Vec<(u32, Key, Vec<Key>)>,
    root: Vec<(u32, Key, u64)>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named file stored as a multi-chunk record. Returns its
    /// content key.
    pub fn add_file(&mut self, name: &str, id: u32, content: &[u8]) -> Key {
        let ckey = md5(content);
        let ekey = self.add_record(blte_record(content, 64));
        self.encoding.push((content.len() as u32, ckey, vec![ekey]));
        self.root.push((id, ckey, name_hash(name)));
        ckey
    }

    /// Store a record in the archive; returns its encoding key.
    pub fn add_record(&mut self, record: Vec<u8>) -> Key {
        let ekey = md5(&record);
        self.records.push((ekey, record));
        ekey
    }

    /// Add an encoding entry with explicit candidates.
    pub fn add_encoding(&mut self, size: u32, ckey: Key, ekeys: Vec<Key>) {
        self.encoding.push((size, ckey, ekeys));
    }

    /// Add a root entry for an existing content key.
    pub fn add_root(&mut self, name: &str, id: u32, ckey: Key) {
        self.root.push((id, ckey, name_hash(name)));
    }

    /// Produce the bootstrap files.
    pub fn build(mut self) -> Build {
        let mut root = self.root.clone();
        root.sort_by_key(|(id, _, _)| *id);
        let root_blob = wow_root(&[root]);
        let root_ckey = md5(&root_blob);
        let root_ekey = self.add_record(blte_single(&root_blob));
        self.encoding
            .push((root_blob.len() as u32, root_ckey, vec![root_ekey]));

        let encoding_blob = encoding_file(&self.encoding);
        let encoding_ckey = md5(&encoding_blob);
        let encoding_record = blte_record(&encoding_blob, 1024);
        let encoding_ekey = md5(&encoding_record);

        let build_config = format!(
            "# Build Configuration\n\nroot = {}\nencoding = {} {}\nbuild-name = test-build\n",
            hex(&root_ckey),
            hex(&encoding_ckey),
            hex(&encoding_ekey)
        );

        Build {
            build_config_hash: hex(&md5(build_config.as_bytes())),
            build_config,
            records: self.records,
            encoding: (encoding_ekey, encoding_record),
        }
    }
}

/// Bootstrap files and records of a synthetic build.
#[derive(Debug)]
pub struct Build {
    pub build_config: String,
    pub build_config_hash: String,
    /// Records stored in archives, including the root file
    pub records: Vec<(Key, Vec<u8>)>,
    /// Encoding key and record of the encoding file
    pub encoding: (Key, Vec<u8>),
}

/// Size of the header before each record in a local archive.
pub const LOCAL_HEADER_SIZE: usize = 30;

/// A local installation on disk.
pub struct LocalInstall {
    pub dir: TempDir,
    /// `(key, archive, offset, size)` of every stored record
    pub entries: Vec<([u8; 9], u16, u32, u32)>,
}

impl LocalInstall {
    /// Write `.build.info`, the build config, `data.000` and a single
    /// `0000000001.idx` shard.
    pub fn write(build: &Build) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(
            root.join(".build.info"),
            format!(
                "Branch!STRING:0|Active!DEC:1|Build Key!HEX:16|CDN Key!HEX:16|Version!STRING:0\n\
                 eu|1|{}|00000000000000000000000000000000|1.0.0.1\n",
                build.build_config_hash
            ),
        )
        .unwrap();

        let hash = &build.build_config_hash;
        let config_dir = root.join("Data/config").join(&hash[0..2]).join(&hash[2..4]);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(hash), &build.build_config).unwrap();

        let mut install = Self {
            dir,
            entries: Vec::new(),
        };
        fs::create_dir_all(install.data_dir()).unwrap();

        let mut archive = Vec::new();
        let records = build.records.iter().chain(std::iter::once(&build.encoding));
        for (ekey, record) in records {
            let entry = append_local_record(&mut archive, ekey, record);
            install.entries.push((truncated(ekey), 0, entry.0, entry.1));
        }
        fs::write(install.data_dir().join("data.000"), &archive).unwrap();
        install.write_shard("0000000001.idx", &install.entries.clone());
        install
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("Data/data")
    }

    pub fn write_shard(&self, name: &str, records: &[([u8; 9], u16, u32, u32)]) {
        fs::write(self.data_dir().join(name), local_shard(records)).unwrap();
    }

    /// Append records to a new archive `data.NNN`, returning their index
    /// records.
    pub fn write_archive(&self, id: u16, records: &[(Key, Vec<u8>)]) -> Vec<([u8; 9], u16, u32, u32)> {
        let mut archive = Vec::new();
        let entries = records
            .iter()
            .map(|(ekey, record)| {
                let (offset, size) = append_local_record(&mut archive, ekey, record);
                (truncated(ekey), id, offset, size)
            })
            .collect();
        fs::write(self.data_dir().join(format!("data.{id:03}")), &archive).unwrap();
        entries
    }
}

/// Append a 30-byte header and record; returns `(offset, size)` with the
/// size including the header.
fn append_local_record(archive: &mut Vec<u8>, ekey: &Key, record: &[u8]) -> (u32, u32) {
    let offset = archive.len() as u32;
    let size = (LOCAL_HEADER_SIZE + record.len()) as u32;
    let mut reversed = *ekey;
    reversed.reverse();
    archive.extend_from_slice(&reversed);
    archive.extend_from_slice(&size.to_be_bytes());
    archive.extend_from_slice(&[0u8; 10]);
    archive.extend_from_slice(record);
    (offset, size)
}
