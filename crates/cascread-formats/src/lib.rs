//! File format parsers for read-only CASC access
//!
//! # Formats
//!
//! - [`blte`]: lazy, seekable BLTE decoding
//! - [`index`]: local `.idx` shards and CDN archive `.index` files
//! - [`encoding`]: content key to encoding key table
//! - [`root`]: root decoder protocol and the legacy WoW root layout
//! - [`config`]: build and CDN configuration files
//! - [`bpsv`]: pipe-separated documents (`.build.info`, `versions`, `cdns`)

#![warn(missing_docs)]

pub mod blte;
pub mod bpsv;
pub mod config;
pub mod encoding;
pub mod index;
pub mod root;

pub use blte::{BlteError, BlteStream, DecodeOptions, Materialization};
pub use encoding::{EncodingCandidate, EncodingTable, KeyWidth};
pub use index::{IndexEntry, IndexLayout, IndexTable};
pub use root::{RootDecoder, RootRecord, RootRecords, WowRootDecoder};
