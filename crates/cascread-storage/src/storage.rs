//! Storage facade: bootstrap and open operations

use std::fmt;
use std::path::Path;

use cascread_crypto::{ContentKey, EncodingKey, name_hash};
use cascread_formats::blte::{DecodeOptions, Materialization};
use cascread_formats::config::BuildConfig;
use cascread_formats::encoding::{EncodingTable, KeyWidth};
use cascread_formats::index::{IndexLayout, IndexTable};
use cascread_formats::root::RootDecoder;
use tracing::{debug, info, trace, warn};

use crate::config::StorageConfig;
use crate::file::CascFile;
use crate::local::LocalArchives;
use crate::remote::{CdnLocator, RemoteCdn};
use crate::resolver::Resolver;
use crate::root_table::RootTable;
use crate::source::ByteSource;
use crate::{Result, StorageError};

/// Initialization progress of a storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStage {
    /// Nothing loaded yet
    Uninitialized,
    /// Reading and merging index shards
    LoadingIndex,
    /// Fetching and parsing the encoding table
    LoadingEncoding,
    /// Fetching and decoding the root table
    LoadingRoot,
    /// All tables loaded
    Ready,
    /// A stage failed; the storage was not created
    Failed,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::LoadingIndex => "loading index",
            Self::LoadingEncoding => "loading encoding",
            Self::LoadingRoot => "loading root",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Read-only CASC storage.
///
/// Construction loads the index, encoding and root tables; afterwards the
/// storage is immutable and every open operation can run from several
/// threads at once.
pub struct CascStorage {
    source: Box<dyn ByteSource>,
    index: IndexTable,
    encoding: EncodingTable,
    root: RootTable,
    options: DecodeOptions,
    stage: InitStage,
}

impl CascStorage {
    /// Open a local game installation.
    pub fn open_local(path: impl AsRef<Path>, decoder: &dyn RootDecoder, config: StorageConfig) -> Result<Self> {
        let source = LocalArchives::open(path, config.index_buckets)?;
        Self::open(source, decoder, config)
    }

    /// Open a build on a CDN.
    pub fn open_remote(locator: &CdnLocator, decoder: &dyn RootDecoder, config: StorageConfig) -> Result<Self> {
        let source = RemoteCdn::open(locator, &config)?;
        Self::open(source, decoder, config)
    }

    /// Load all tables from a byte source.
    ///
    /// Either every stage succeeds and the storage is ready, or the error
    /// names the stage that failed.
    pub fn open(source: impl ByteSource + 'static, decoder: &dyn RootDecoder, config: StorageConfig) -> Result<Self> {
        let mut bootstrap = Bootstrap {
            source: &source,
            options: config.decode_options(),
            stage: InitStage::Uninitialized,
        };

        let result = bootstrap.run(decoder);
        debug!("bootstrap finished in stage {}", bootstrap.stage);

        match result {
            Ok((index, encoding, root)) => {
                info!(
                    "storage ready: {} index entries, {} encoding entries, {} root names",
                    index.len(),
                    encoding.len(),
                    root.len()
                );
                Ok(Self {
                    source: Box::new(source),
                    index,
                    encoding,
                    root,
                    options: config.decode_options(),
                    stage: InitStage::Ready,
                })
            }
            Err(err) => {
                warn!("storage initialization failed: {}", err);
                Err(err)
            }
        }
    }

    /// Open a file by path.
    pub fn open_by_name(&self, name: &str) -> Result<Option<CascFile>> {
        self.open_by_hash(name_hash(name))
    }

    /// Open a file by the stable hash of its path.
    ///
    /// Root entries are tried in table order, then each content key's
    /// encoding candidates in order.
    pub fn open_by_hash(&self, hash: u64) -> Result<Option<CascFile>> {
        for entry in self.root.lookup_hash(hash) {
            if let Some(file) = self.open_by_content_key(&entry.content_key)? {
                return Ok(Some(file));
            }
        }
        trace!("no resolvable root entry for name hash {:016x}", hash);
        Ok(None)
    }

    /// Open a file by its numeric file id.
    pub fn open_by_file_data_id(&self, file_data_id: u32) -> Result<Option<CascFile>> {
        for content_key in self.root.lookup_id(file_data_id) {
            if let Some(file) = self.open_by_content_key(content_key)? {
                return Ok(Some(file));
            }
        }
        trace!("no resolvable root entry for file id {}", file_data_id);
        Ok(None)
    }

    /// Open a file by content key.
    pub fn open_by_content_key(&self, key: &ContentKey) -> Result<Option<CascFile>> {
        let Some(candidates) = self.encoding.lookup(key) else {
            trace!("content key {} not in encoding table", key);
            return Ok(None);
        };
        self.resolver().open_candidates(candidates)
    }

    /// Open a file by encoding key.
    pub fn open_by_encoding_key(&self, key: &EncodingKey) -> Result<Option<CascFile>> {
        self.resolver().open_encoding_key(key)
    }

    /// True if the root table has an entry for `name`
    pub fn contains_name(&self, name: &str) -> bool {
        !self.root.lookup_hash(name_hash(name)).is_empty()
    }

    /// Content keys recorded for a name hash, in root table order
    pub fn content_keys_for_hash(&self, hash: u64) -> Vec<ContentKey> {
        self.root
            .lookup_hash(hash)
            .iter()
            .map(|entry| entry.content_key)
            .collect()
    }

    /// Number of indexed records
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Number of content keys in the encoding table
    pub fn encoding_len(&self) -> usize {
        self.encoding.len()
    }

    /// Number of distinct name hashes in the root table
    pub fn root_len(&self) -> usize {
        self.root.len()
    }

    /// Initialization stage; always [`InitStage::Ready`] for a constructed
    /// storage
    pub fn stage(&self) -> InitStage {
        self.stage
    }

    /// Root table of the build
    pub fn root(&self) -> &RootTable {
        &self.root
    }

    /// Build configuration of the opened build
    pub fn build_config(&self) -> &BuildConfig {
        self.source.build_config()
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.source.as_ref(), &self.index, self.options)
    }
}

impl fmt::Debug for CascStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascStorage")
            .field("stage", &self.stage)
            .field("index", &self.index.len())
            .field("encoding", &self.encoding.len())
            .field("root", &self.root.len())
            .finish_non_exhaustive()
    }
}

/// Stage-by-stage table loading.
struct Bootstrap<'a> {
    source: &'a dyn ByteSource,
    options: DecodeOptions,
    stage: InitStage,
}

impl Bootstrap<'_> {
    fn run(&mut self, decoder: &dyn RootDecoder) -> Result<(IndexTable, EncodingTable, RootTable)> {
        let result = self.load_all(decoder);
        if result.is_err() {
            self.enter(InitStage::Failed);
        }
        result
    }

    fn load_all(&mut self, decoder: &dyn RootDecoder) -> Result<(IndexTable, EncodingTable, RootTable)> {
        self.enter(InitStage::LoadingIndex);
        let index = self.load_index()?;

        self.enter(InitStage::LoadingEncoding);
        let encoding = self.load_encoding(&index)?;

        self.enter(InitStage::LoadingRoot);
        let root = self.load_root(&index, &encoding, decoder)?;

        self.enter(InitStage::Ready);
        Ok((index, encoding, root))
    }

    fn enter(&mut self, stage: InitStage) {
        debug!("bootstrap stage {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn structural(&self, message: impl Into<String>) -> StorageError {
        StorageError::Structural {
            stage: self.stage,
            message: message.into(),
        }
    }

    fn load_index(&self) -> Result<IndexTable> {
        let layout = self.source.layout();
        let shards = self.source.index_shards()?;
        let mut index = IndexTable::new();
        let mut loaded = 0usize;

        for shard in &shards {
            let data = match self.source.read_index_shard(shard) {
                Ok(data) => data,
                Err(err) => {
                    warn!("skipping index {}: {}", shard.name, err);
                    continue;
                }
            };
            match index.merge(layout, &data, shard.archive_id) {
                Ok(count) => {
                    debug!("merged {} entries from {}", count, shard.name);
                    loaded += 1;
                }
                Err(source) => {
                    let err = StorageError::Index {
                        shard: shard.name.clone(),
                        source,
                    };
                    warn!("skipping index: {}", err);
                }
            }
        }

        info!(
            "loaded {} of {} index files ({} entries)",
            loaded,
            shards.len(),
            index.len()
        );
        Ok(index)
    }

    fn load_encoding(&self, index: &IndexTable) -> Result<EncodingTable> {
        let key = self.source.build_config().encoding_key();
        let options = self.options.with_materialization(Materialization::Eager);
        let resolver = Resolver::new(self.source, index, options).with_loose_records();

        let file = resolver
            .open_encoding_key(&key)
            .map_err(|e| self.structural(format!("encoding table {key} not decodable: {e}")))?
            .ok_or_else(|| self.structural(format!("encoding table {key} not resolvable")))?;
        let data = file
            .read_all()
            .map_err(|e| self.structural(format!("encoding table {key} not decodable: {e}")))?;

        let width = match self.source.layout() {
            IndexLayout::Local => KeyWidth::Truncated,
            IndexLayout::Archive => KeyWidth::Full,
        };
        let encoding = EncodingTable::parse(&data, width)
            .map_err(|e| self.structural(format!("encoding table {key} not parsable: {e}")))?;

        info!("loaded encoding table with {} content keys", encoding.len());
        Ok(encoding)
    }

    fn load_root(&self, index: &IndexTable, encoding: &EncodingTable, decoder: &dyn RootDecoder) -> Result<RootTable> {
        let root_key = self.source.build_config().root();
        let candidates = encoding
            .lookup(&root_key)
            .ok_or_else(|| self.structural(format!("root {root_key} not in encoding table")))?;
        let resolver = Resolver::new(self.source, index, self.options).with_loose_records();

        for candidate in candidates {
            let file = match resolver.open_encoding_key(&candidate.key) {
                Ok(Some(file)) => file,
                Ok(None) => {
                    debug!("root candidate {} not resolvable", candidate.key);
                    continue;
                }
                Err(err) => {
                    warn!("root candidate {} not decodable: {}", candidate.key, err);
                    continue;
                }
            };

            match RootTable::from_records(decoder.decode(Box::new(file.into_exact_reader()))) {
                Ok(root) if !root.is_empty() => {
                    info!(
                        "loaded root table with {} records ({} names)",
                        root.record_count(),
                        root.len()
                    );
                    return Ok(root);
                }
                Ok(_) => warn!("root candidate {} has no records", candidate.key),
                Err(err) => warn!("root candidate {} failed to decode: {}", candidate.key, err),
            }
        }

        Err(self.structural(format!(
            "none of the {} candidates of root {root_key} yielded records",
            candidates.len()
        )))
    }
}
