//! Error types for encoding table parsing

use thiserror::Error;

/// Errors that can occur when parsing an encoding table
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum EncodingError {
    #[error("Invalid magic: expected 'EN', got {0:?}")]
    InvalidMagic([u8; 2]),

    #[error("Invalid key size for {field}: {value}")]
    InvalidHashSize { field: &'static str, value: u8 },

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    #[error("Encoding table truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Entry at offset {offset} overruns page {page}")]
    PageOverrun { page: usize, offset: usize },

    #[error("Binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for encoding operations
pub type EncodingResult<T> = Result<T, EncodingError>;
