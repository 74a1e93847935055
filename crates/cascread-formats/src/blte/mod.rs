//! BLTE (Block Table Encoded) decoding
//!
//! BLTE is the container every archived record is stored in. A record is a
//! `BLTE` magic, a header size, an optional chunk table and a sequence of
//! chunks. Each chunk starts with a one-byte mode tag:
//!
//! - `N`: stored as-is
//! - `Z`: zlib (two-byte header followed by raw deflate)
//! - `F`: a complete nested BLTE record
//! - `E`: encrypted, rejected by this reader
//!
//! Decoding is lazy: [`BlteStream`] knows the total decompressed length as
//! soon as the header is parsed and decodes chunks only as reads or seeks
//! reach them.
//!
//! ```
//! use cascread_formats::blte::BlteStream;
//! use std::io::Read;
//!
//! let record = b"BLTE\0\0\0\0Nhello";
//! let mut stream = BlteStream::new(&record[..], Some(record.len() as u64)).unwrap();
//! let mut text = String::new();
//! stream.read_to_string(&mut text).unwrap();
//! assert_eq!(text, "hello");
//! ```

mod error;
mod header;
mod stream;

pub use error::{BlteError, BlteResult};
pub use header::{BLTE_MAGIC, BlteHeader, ChunkInfo, HeaderFlags};
pub use stream::{
    BlteStream, DEFAULT_MAX_FRAME_DEPTH, DecodeOptions, MAX_DECOMPRESSION_SIZE, Materialization,
};

/// Decode a complete in-memory record.
pub fn decode(record: &[u8], options: DecodeOptions) -> BlteResult<Vec<u8>> {
    BlteStream::with_options(record, Some(record.len() as u64), options)?.decode_all()
}
