//! Configuration for splitkv
//!
//! Centralized index configuration with sensible defaults. Every value here is
//! fixed for the lifetime of an index: changing the value length or outgrowing
//! the directory means building a new index and migrating entries.

use crate::block::{EntryLayout, COUNT_HEADER_SIZE};
use crate::error::{IndexError, Result};
use crate::index::ROUTE_HEADER_SIZE;

/// Largest directory an index may request (2^24 slots)
pub const MAX_INDEX_SIZE: usize = 1 << 24;

/// Bytes of every block frame that are not entries
pub const BLOCK_FRAME_OVERHEAD: usize = ROUTE_HEADER_SIZE + COUNT_HEADER_SIZE;

/// Main configuration for an index instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    // -------------------------------------------------------------------------
    // Directory Configuration
    // -------------------------------------------------------------------------
    /// Requested number of directory slots. Rounded up to the next power of
    /// two; the resulting table size is the hard ceiling on the number of
    /// blocks and never grows after creation.
    pub index_size: usize,

    // -------------------------------------------------------------------------
    // Entry Configuration
    // -------------------------------------------------------------------------
    /// Exact length in bytes of every stored value
    pub value_length: usize,

    // -------------------------------------------------------------------------
    // Block Configuration
    // -------------------------------------------------------------------------
    /// Size in bytes of each block frame handed to the block store
    pub block_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_size: 1024,
            value_length: 8,
            block_size: 4096,
        }
    }
}

impl IndexConfig {
    /// Create a new config builder
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    /// Number of directory slots (power of two)
    pub fn table_size(&self) -> usize {
        self.index_size.max(1).next_power_of_two()
    }

    /// `log2(table_size)`: the most key bits the directory can discriminate on
    pub fn global_depth(&self) -> u32 {
        self.table_size().trailing_zeros()
    }

    /// Encoded size of one entry (key + value)
    pub fn entry_size(&self) -> usize {
        self.layout().entry_size()
    }

    /// Entries that fit into one block
    pub fn block_capacity(&self) -> usize {
        self.block_size.saturating_sub(BLOCK_FRAME_OVERHEAD) / self.entry_size()
    }

    pub fn layout(&self) -> EntryLayout {
        EntryLayout::new(self.value_length)
    }

    /// Check the configuration before building an index from it
    pub fn validate(&self) -> Result<()> {
        if self.index_size == 0 {
            return Err(IndexError::Config("index size must be positive".to_string()));
        }
        if self.index_size > MAX_INDEX_SIZE {
            return Err(IndexError::Config(format!(
                "index size {} exceeds maximum {}",
                self.index_size, MAX_INDEX_SIZE
            )));
        }
        if self.value_length == 0 {
            return Err(IndexError::Config("value length must be positive".to_string()));
        }
        if u32::try_from(self.block_size).is_err() {
            return Err(IndexError::Config(format!(
                "block size {} does not fit in 32 bits",
                self.block_size
            )));
        }
        if self.block_capacity() == 0 {
            return Err(IndexError::Config(format!(
                "block size {} cannot hold a single {}-byte entry",
                self.block_size,
                self.entry_size()
            )));
        }
        Ok(())
    }
}

/// Builder for IndexConfig
#[derive(Default)]
pub struct IndexConfigBuilder {
    config: IndexConfig,
    entries_per_block: Option<usize>,
}

impl IndexConfigBuilder {
    /// Set the requested directory size (rounded up to a power of two)
    pub fn index_size(mut self, size: usize) -> Self {
        self.config.index_size = size;
        self
    }

    /// Set the fixed value length (in bytes)
    pub fn value_length(mut self, len: usize) -> Self {
        self.config.value_length = len;
        self
    }

    /// Set the block size (in bytes)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self.entries_per_block = None;
        self
    }

    /// Size blocks to hold exactly `count` entries
    ///
    /// Resolved against the final value length in `build`, so it may be called
    /// before or after `value_length`.
    pub fn entries_per_block(mut self, count: usize) -> Self {
        self.entries_per_block = Some(count);
        self
    }

    pub fn build(self) -> IndexConfig {
        let mut config = self.config;
        if let Some(count) = self.entries_per_block {
            config.block_size = BLOCK_FRAME_OVERHEAD + count * config.entry_size();
        }
        config
    }
}
