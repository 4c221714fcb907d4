//! Error types for splitkv
//!
//! Provides a unified error type for all index and store operations.

use thiserror::Error;

use crate::store::BlockId;

/// Result type alias using IndexError
pub type Result<T> = std::result::Result<T, IndexError>;

/// Unified error type for splitkv operations
#[derive(Debug, Error)]
pub enum IndexError {
    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Value length {actual} does not match configured value length {expected}")]
    ValueTooLong { expected: usize, actual: usize },

    #[error("Index full: key {key} cannot be split beyond local depth {depth}")]
    IndexFull { key: u64, depth: u32 },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Block {0} was never allocated")]
    UnknownBlock(BlockId),

    #[error("Block store is closed")]
    StoreClosed,

    // -------------------------------------------------------------------------
    // Index State Errors
    // -------------------------------------------------------------------------
    #[error("Index still has {0} other open handles")]
    StillShared(usize),

    #[error("Index corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IndexError {
    /// Whether this error came from the block store rather than the caller.
    ///
    /// The index never retries these; the owning engine decides.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            IndexError::Io(_)
                | IndexError::Storage(_)
                | IndexError::UnknownBlock(_)
                | IndexError::StoreClosed
        )
    }
}

impl From<bincode::Error> for IndexError {
    fn from(e: bincode::Error) -> Self {
        IndexError::Serialization(e.to_string())
    }
}
