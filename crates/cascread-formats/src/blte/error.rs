//! BLTE error types

use std::io;
use thiserror::Error;

/// BLTE-specific error type
#[derive(Debug, Error)]
pub enum BlteError {
    /// Invalid BLTE magic bytes
    #[error("invalid BLTE magic: expected [42 4C 54 45], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Invalid header format
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Invalid chunk count
    #[error("invalid chunk count: {0}")]
    InvalidChunkCount(u32),

    /// Chunk table entry with a compressed size of zero
    #[error("empty chunk (zero size) at index {0}")]
    EmptyChunk(usize),

    /// Unknown chunk mode tag
    #[error("unknown chunk mode: 0x{0:02X}")]
    UnknownChunkMode(u8),

    /// Encrypted chunks are not supported by this reader
    #[error("encrypted chunk at index {0} is not supported")]
    EncryptedChunk(usize),

    /// Decoded chunk size differs from the chunk table
    #[error("chunk {chunk} decoded to {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// Chunk index
        chunk: usize,
        /// Size declared in the chunk table
        expected: u64,
        /// Size actually produced
        actual: u64,
    },

    /// Checksum mismatch
    #[error("checksum mismatch in chunk {chunk}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Chunk index
        chunk: usize,
        /// Expected checksum
        expected: String,
        /// Actual checksum
        actual: String,
    },

    /// Decompression failed
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// Nested frames exceed the configured depth
    #[error("nested BLTE frame depth {depth} exceeds limit {limit}")]
    FrameDepthExceeded {
        /// Depth that was reached
        depth: u8,
        /// Configured limit
        limit: u8,
    },

    /// Record ended before all declared content was decoded
    #[error("record truncated: decoded {actual} of {expected} bytes")]
    Truncated {
        /// Declared content length
        expected: u64,
        /// Bytes available
        actual: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl BlteError {
    /// True for content this reader deliberately refuses, as opposed to
    /// malformed content.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::EncryptedChunk(_))
    }

    /// Recover a BLTE error that travelled through [`io::Read`].
    ///
    /// Errors raised by [`BlteStream`](super::BlteStream) while reading are
    /// wrapped in an [`io::Error`]; this unwraps them again. Plain I/O errors
    /// become [`BlteError::Io`].
    pub fn from_io(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            let kind = err.kind();
            return match err.into_inner().map(|inner| inner.downcast::<Self>()) {
                Some(Ok(blte)) => *blte,
                Some(Err(other)) => Self::Io(io::Error::new(kind, other)),
                None => Self::Io(io::Error::from(kind)),
            };
        }
        Self::Io(err)
    }
}

impl From<BlteError> for io::Error {
    fn from(err: BlteError) -> Self {
        match err {
            BlteError::Io(inner) => inner,
            err if err.is_unsupported() => Self::new(io::ErrorKind::Unsupported, err),
            err => Self::new(io::ErrorKind::InvalidData, err),
        }
    }
}

/// Result type for BLTE operations
pub type BlteResult<T> = Result<T, BlteError>;
