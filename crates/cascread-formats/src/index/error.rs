//! Index error types

use thiserror::Error;

/// Errors raised while parsing index files
#[derive(Debug, Error)]
pub enum IndexError {
    /// File is smaller than its fixed structures
    #[error("index truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required
        needed: u64,
        /// Bytes present
        available: u64,
    },

    /// Archive index footer carries values this reader cannot use
    #[error("invalid archive index footer: {0}")]
    InvalidFooter(String),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
