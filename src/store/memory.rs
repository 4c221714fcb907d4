//! In-memory block store
//!
//! Keeps every block in a `Vec`. Nothing survives the process, but two index
//! objects sharing one store through an `Arc` see each other's flushed state,
//! which is enough to exercise recovery in tests.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::{IndexError, Result};

use super::{BlockId, BlockStore};

/// Ephemeral block store
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexError::StoreClosed);
        }
        Ok(())
    }
}

impl BlockStore for MemoryBlockStore {
    fn allocate_block(&self, size: usize) -> Result<BlockId> {
        self.ensure_open()?;

        let mut blocks = self.blocks.write();
        blocks.push(vec![0u8; size]);
        Ok((blocks.len() - 1) as BlockId)
    }

    fn read_block(&self, id: BlockId) -> Result<Vec<u8>> {
        self.ensure_open()?;

        let blocks = self.blocks.read();
        blocks
            .get(id as usize)
            .cloned()
            .ok_or(IndexError::UnknownBlock(id))
    }

    fn write_block(&self, id: BlockId, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;

        let mut blocks = self.blocks.write();
        let block = blocks.get_mut(id as usize).ok_or(IndexError::UnknownBlock(id))?;

        if bytes.len() > block.len() {
            return Err(IndexError::Storage(format!(
                "Write of {} bytes exceeds block {} size {}",
                bytes.len(),
                id,
                block.len()
            )));
        }

        block[..bytes.len()].copy_from_slice(bytes);
        block[bytes.len()..].fill(0);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.ensure_open()
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn truncate(&self) -> Result<()> {
        self.ensure_open()?;
        self.blocks.write().clear();
        Ok(())
    }

    fn block_count(&self) -> usize {
        self.blocks.read().len()
    }
}
