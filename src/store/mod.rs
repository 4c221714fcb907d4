//! Block Store Module
//!
//! Raw, block-addressed byte storage underneath the index.
//!
//! ## Contract
//! - Ids are dense and handed out in allocation order, starting at 0.
//! - A block keeps the size it was allocated with; `read_block` returns that
//!   many bytes and `write_block` accepts at most that many (the rest is
//!   zero filled).
//! - Writes are visible to subsequent reads immediately; they are durable only
//!   once `flush` returns.
//! - All calls are synchronous and may block on I/O.
//!
//! ## Implementations
//! - `MemoryBlockStore`: ephemeral, for tests and scratch indexes
//! - `FileBlockStore`: a single append-allocated file

mod file;
mod memory;

use std::sync::Arc;

use crate::error::Result;

pub use file::FileBlockStore;
pub use memory::MemoryBlockStore;

/// Identifier of a block within a store
pub type BlockId = u64;

/// Persistence collaborator used by the index
pub trait BlockStore: Send + Sync {
    /// Allocate a zero-filled block of `size` bytes
    fn allocate_block(&self, size: usize) -> Result<BlockId>;

    /// Read the full contents of a block
    fn read_block(&self, id: BlockId) -> Result<Vec<u8>>;

    /// Overwrite a block from its start
    fn write_block(&self, id: BlockId, bytes: &[u8]) -> Result<()>;

    /// Make every previous write durable
    fn flush(&self) -> Result<()>;

    /// Release the store; later calls fail with `StoreClosed`
    fn close(&self) -> Result<()>;

    /// Discard every block; the next allocation returns id 0 again
    fn truncate(&self) -> Result<()>;

    /// Number of allocated blocks
    fn block_count(&self) -> usize;
}

impl<S: BlockStore + ?Sized> BlockStore for Arc<S> {
    fn allocate_block(&self, size: usize) -> Result<BlockId> {
        (**self).allocate_block(size)
    }

    fn read_block(&self, id: BlockId) -> Result<Vec<u8>> {
        (**self).read_block(id)
    }

    fn write_block(&self, id: BlockId, bytes: &[u8]) -> Result<()> {
        (**self).write_block(id, bytes)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn truncate(&self) -> Result<()> {
        (**self).truncate()
    }

    fn block_count(&self) -> usize {
        (**self).block_count()
    }
}
