//! Root decoding errors

use thiserror::Error;

/// Errors produced while decoding a root table
#[derive(Debug, Error)]
pub enum RootError {
    /// Stream ended inside a block
    #[error("root block {block} truncated while reading {context}")]
    Truncated {
        /// Zero-based block number
        block: usize,
        /// Which part of the block was being read
        context: &'static str,
    },

    /// Underlying read failed (including BLTE decode errors)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for root decoding
pub type RootResult<T> = Result<T, RootError>;
