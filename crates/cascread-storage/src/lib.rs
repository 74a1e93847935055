//! Read-only CASC storage over local installations and CDNs.
//!
//! A [`CascStorage`] resolves file names or file ids to decompressed
//! content through the chain
//!
//! ```text
//! name -> name hash -> content key -> encoding key -> archive location -> BLTE
//! ```
//!
//! Bytes come from a [`ByteSource`]: [`LocalArchives`] reads an installed
//! game's `Data` directory through memory maps, [`RemoteCdn`] fetches byte
//! ranges from a CDN over HTTP. Both feed the same resolution engine.
//!
//! # Example
//!
//! ```rust,no_run
//! use cascread_formats::WowRootDecoder;
//! use cascread_storage::{CascStorage, StorageConfig};
//! use std::io::Read;
//!
//! # fn example() -> cascread_storage::Result<()> {
//! let storage = CascStorage::open_local("/games/wow", &WowRootDecoder, StorageConfig::default())?;
//! if let Some(mut file) = storage.open_by_name("Interface/FrameXML/UIParent.lua")? {
//!     let mut text = String::new();
//!     file.read_to_string(&mut text)?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use thiserror::Error;

mod build_info;
mod config;
mod file;
mod local;
mod remote;
mod resolver;
mod root_table;
mod source;
mod storage;

pub use build_info::BuildInfo;
pub use config::StorageConfig;
pub use file::CascFile;
pub use local::{LocalArchives, LocalRecordHeader};
pub use remote::{CdnLocator, RemoteCdn};
pub use root_table::{RootEntry, RootTable};
pub use source::{ByteSource, IndexShard, RecordReader};
pub use storage::{CascStorage, InitStage};

use cascread_formats::blte::BlteError;
use cascread_formats::bpsv::BpsvError;
use cascread_formats::config::ConfigError;
use cascread_formats::encoding::EncodingError;
use cascread_formats::index::IndexError;
use cascread_formats::root::RootError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// A file that simply does not exist is not an error: lookups return
/// `Ok(None)`.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// BLTE record is malformed or uses an unsupported feature.
    #[error("BLTE error: {0}")]
    Blte(#[from] BlteError),

    /// Index file could not be parsed.
    #[error("index error in {shard}: {source}")]
    Index {
        /// Shard or archive name
        shard: String,
        /// Parse failure
        #[source]
        source: IndexError,
    },

    /// Encoding table could not be parsed.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Root table could not be decoded.
    #[error("root error: {0}")]
    Root(#[from] RootError),

    /// Build or CDN configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `.build.info`, `versions` or `cdns` document is invalid.
    #[error("BPSV error: {0}")]
    Bpsv(#[from] BpsvError),

    /// Installation or CDN metadata is unusable.
    #[error("invalid setup: {0}")]
    Setup(String),

    /// Archive record lies outside its archive.
    #[error("archive error: {0}")]
    Archive(String),

    /// HTTP request failed.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL
        url: String,
        /// Client error
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request returned an error status.
    #[error("request to {url} returned status {status}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// Status code
        status: u16,
    },

    /// A bootstrap table could not be built.
    #[error("initialization failed while {stage}: {message}")]
    Structural {
        /// Stage that failed
        stage: InitStage,
        /// What went wrong
        message: String,
    },
}

impl StorageError {
    /// True for content this reader deliberately refuses, such as
    /// encrypted chunks.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Blte(err) if err.is_unsupported())
    }

    /// True for failures of the byte source rather than of the data.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::HttpStatus { .. } | Self::Archive(_) | Self::Io(_) => true,
            Self::Blte(BlteError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Version information for the storage system.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default data directory name (installation root).
pub const DEFAULT_DATA_DIR: &str = "Data";

/// Data subdirectory where both `.idx` and `.data` files live.
pub const DATA_DIR: &str = "data";

/// Configuration subdirectory under the data directory.
pub const CONFIG_DIR: &str = "config";

/// `.build.info` filename at the installation root.
pub const BUILD_INFO_FILE: &str = ".build.info";
