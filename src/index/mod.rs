//! Index Module
//!
//! The splitting hash index that coordinates directory, blocks and store.
//!
//! ## Responsibilities
//! - Route keys to blocks through the directory
//! - Split full blocks (cascading when keys share low-order bits)
//! - Track dirty blocks and write them back on flush
//! - Rebuild the directory from the store on open/reopen
//!
//! ## Insertion State Machine
//! ```text
//!   Resolve ──▶ Attempt-Insert ──▶ Success
//!      ▲              │
//!      │            Full
//!      │              ▼
//!      └──────── Split ──────────▶ IndexFull
//! ```

mod meta;
mod recovery;
mod shared;
mod split;

use tracing::{info, trace};

use crate::block::{Block, EntryLayout, InsertOutcome};
use crate::config::IndexConfig;
use crate::directory::{BlockRef, Directory};
use crate::error::{IndexError, Result};
use crate::store::{BlockId, BlockStore};

pub use meta::{IndexMeta, FIRST_BLOCK_ID, META_BLOCK_ID, ROUTE_HEADER_SIZE};
pub use shared::SharedIndex;

/// One entry of the block arena
#[derive(Debug)]
struct BlockSlot {
    /// Where the block lives in the store
    id: BlockId,
    block: Block,
    /// Modified since last written to the store
    dirty: bool,
}

/// Snapshot of index shape, for monitoring and the CLI
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub entry_count: usize,
    pub block_count: usize,
    pub table_size: usize,
    pub global_depth: u32,
    pub max_local_depth: u32,
    pub block_capacity: usize,
    /// Live entries divided by the capacity of all allocated blocks
    pub fill_ratio: f64,
    pub dirty_blocks: usize,
}

/// Persistent hash index from `u64` keys to fixed-length values
///
/// ## Concurrency Model: Single Writer
///
/// Mutations take `&mut self`, so only one can be in flight; a split rewrites
/// several blocks and directory slots and is not atomic on its own. Reads take
/// `&self` and never touch the store. Wrap in `SharedIndex` to share across
/// threads.
pub struct HashIndex<S: BlockStore> {
    store: S,
    config: IndexConfig,
    layout: EntryLayout,
    capacity: usize,
    directory: Directory,

    /// Block arena, indexed by `BlockRef`
    blocks: Vec<BlockSlot>,

    /// Allocated store blocks not referenced by the metadata
    spare_blocks: Vec<BlockId>,

    /// Metadata block needs rewriting on next flush
    meta_dirty: bool,
}

impl<S: BlockStore> HashIndex<S> {
    /// Create a fresh index in an empty store
    ///
    /// Writes the metadata block and the single initial block.
    pub fn create(store: S, config: IndexConfig) -> Result<Self> {
        config.validate()?;

        let existing = store.block_count();
        if existing != 0 {
            return Err(IndexError::Config(format!(
                "Store already holds {} blocks; open it instead",
                existing
            )));
        }

        let mut index = Self::empty(store, config);
        index.initialize()?;

        info!(
            table_size = index.config.table_size(),
            value_length = index.config.value_length,
            block_capacity = index.capacity,
            "Created hash index"
        );

        Ok(index)
    }

    /// Open an index previously created in `store`
    pub fn open(store: S) -> Result<Self> {
        let loaded = recovery::load(&store)?;

        let index = Self {
            store,
            layout: loaded.config.layout(),
            capacity: loaded.config.block_capacity(),
            config: loaded.config,
            directory: loaded.directory,
            blocks: loaded.blocks,
            spare_blocks: loaded.spare_blocks,
            meta_dirty: false,
        };

        index.log_opened();
        Ok(index)
    }

    /// Open the index in `store`, or create one if the store is empty
    ///
    /// An existing index must have been created with the same configuration.
    pub fn open_or_create(store: S, config: IndexConfig) -> Result<Self> {
        if store.block_count() == 0 {
            return Self::create(store, config);
        }

        config.validate()?;
        let index = Self::open(store)?;
        let persisted = &index.config;

        if persisted.table_size() != config.table_size()
            || persisted.value_length != config.value_length
            || persisted.block_size != config.block_size
        {
            return Err(IndexError::Config(format!(
                "Persisted index {:?} does not match requested {:?}",
                persisted, config
            )));
        }

        Ok(index)
    }

    // =========================================================================
    // Core Operations
    // =========================================================================

    /// Get a copy of the value stored for `key`
    pub fn get(&self, key: u64) -> Option<Vec<u8>> {
        self.slot_for(key).block.get(key).map(|value| value.to_vec())
    }

    pub fn contains_key(&self, key: u64) -> bool {
        self.slot_for(key).block.get(key).is_some()
    }

    /// Insert or replace a value. Returns whether an existing value was replaced.
    ///
    /// Errors:
    /// - `ValueTooLong` if `value` is not exactly `value_length` bytes; nothing changes
    /// - `IndexFull` if the target block cannot be split any further; splits
    ///   already completed during this call stay in place
    /// - storage errors from a split; the directory and blocks are unchanged
    pub fn put(&mut self, key: u64, value: &[u8]) -> Result<bool> {
        let value = self.layout.value(value)?;

        loop {
            let target = self.directory.resolve(key);
            let slot = &mut self.blocks[target];

            match slot.block.put(key, value.clone()) {
                InsertOutcome::Replaced => {
                    slot.dirty = true;
                    return Ok(true);
                }
                InsertOutcome::Inserted => {
                    slot.dirty = true;
                    return Ok(false);
                }
                InsertOutcome::Full => self.split(target, key)?,
            }
        }
    }

    /// Remove `key`, returning its value if it was present
    ///
    /// Blocks are never merged, however empty they become.
    pub fn remove(&mut self, key: u64) -> Option<Vec<u8>> {
        let target = self.directory.resolve(key);
        let slot = &mut self.blocks[target];

        let removed = slot.block.remove(key)?;
        slot.dirty = true;
        Some(removed.to_vec())
    }

    /// Discard every block and return to the single-block start state
    pub fn clear(&mut self) -> Result<()> {
        let dropped = self.blocks.len();

        self.store.truncate()?;
        self.initialize()?;

        info!(dropped_blocks = dropped, "Cleared hash index");
        Ok(())
    }

    /// Write every modified block and make the store durable
    pub fn flush(&mut self) -> Result<()> {
        let mut written = 0;

        for position in 0..self.blocks.len() {
            if self.blocks[position].dirty {
                self.write_block(position)?;
                written += 1;
            }
        }

        if self.meta_dirty {
            self.write_meta()?;
        }

        self.store.flush()?;

        trace!(blocks_written = written, "Flushed hash index");
        Ok(())
    }

    /// Reload directory and blocks from the store, dropping in-memory state
    ///
    /// Unflushed changes are lost.
    pub fn reopen(&mut self) -> Result<()> {
        let loaded = recovery::load(&self.store)?;

        self.layout = loaded.config.layout();
        self.capacity = loaded.config.block_capacity();
        self.config = loaded.config;
        self.directory = loaded.directory;
        self.blocks = loaded.blocks;
        self.spare_blocks = loaded.spare_blocks;
        self.meta_dirty = false;

        self.log_opened();
        Ok(())
    }

    /// Close the underlying store. Does not flush.
    pub fn close(self) -> Result<()> {
        info!(blocks = self.blocks.len(), "Closing hash index");
        self.store.close()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of distinct allocated blocks
    pub fn block_count(&self) -> usize {
        self.directory.block_count()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|slot| slot.block.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|slot| slot.block.is_empty())
    }

    pub fn table_size(&self) -> usize {
        self.directory.table_size()
    }

    pub fn global_depth(&self) -> u32 {
        self.directory.global_depth()
    }

    pub fn value_length(&self) -> usize {
        self.layout.value_length()
    }

    pub fn block_capacity(&self) -> usize {
        self.capacity
    }

    /// Local depth of the block `key` routes to
    pub fn local_depth_of_key(&self, key: u64) -> u32 {
        self.directory.local_depth_of(self.directory.resolve(key))
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All entries, block by block
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[u8])> + '_ {
        self.blocks
            .iter()
            .flat_map(|slot| slot.block.entries())
            .map(|(key, value)| (key, value.as_bytes()))
    }

    pub fn stats(&self) -> IndexStats {
        let entry_count = self.len();
        let block_count = self.block_count();
        let max_local_depth = self
            .directory
            .routes()
            .iter()
            .map(|route| route.depth)
            .max()
            .unwrap_or(0);

        IndexStats {
            entry_count,
            block_count,
            table_size: self.table_size(),
            global_depth: self.global_depth(),
            max_local_depth,
            block_capacity: self.capacity,
            fill_ratio: entry_count as f64 / (block_count * self.capacity) as f64,
            dirty_blocks: self.blocks.iter().filter(|slot| slot.dirty).count(),
        }
    }

    /// Verify the directory routing invariant and that every entry sits in
    /// the block its key routes to
    pub fn check_invariants(&self) -> Result<()> {
        self.directory.check_invariants()?;

        for (position, slot) in self.blocks.iter().enumerate() {
            for (key, _) in slot.block.entries() {
                if self.directory.resolve(key) != position {
                    return Err(IndexError::Corruption(format!(
                        "Key {} stored in block {} but routes to block {}",
                        key,
                        position,
                        self.directory.resolve(key)
                    )));
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn empty(store: S, config: IndexConfig) -> Self {
        Self {
            store,
            layout: config.layout(),
            capacity: config.block_capacity(),
            directory: Directory::new(config.table_size()),
            config,
            blocks: Vec::new(),
            spare_blocks: Vec::new(),
            meta_dirty: false,
        }
    }

    fn log_opened(&self) {
        info!(
            blocks = self.blocks.len(),
            spare_blocks = self.spare_blocks.len(),
            entries = self.len(),
            table_size = self.config.table_size(),
            "Opened hash index"
        );
    }

    /// Allocate and write the metadata block and one empty block in an empty store
    fn initialize(&mut self) -> Result<()> {
        self.directory = Directory::new(self.config.table_size());
        self.blocks = vec![BlockSlot {
            id: FIRST_BLOCK_ID,
            block: Block::new(self.layout, self.capacity),
            dirty: true,
        }];
        self.spare_blocks.clear();
        self.meta_dirty = true;

        let meta_id = self
            .store
            .allocate_block(IndexMeta::allocation_size(self.config.table_size()))?;
        let first_id = self.store.allocate_block(self.config.block_size)?;

        if meta_id != META_BLOCK_ID || first_id != FIRST_BLOCK_ID {
            return Err(IndexError::Storage(format!(
                "Store allocated ids ({}, {}) for a fresh index, expected ({}, {})",
                meta_id, first_id, META_BLOCK_ID, FIRST_BLOCK_ID
            )));
        }

        self.write_block(0)?;
        self.write_meta()
    }

    fn slot_for(&self, key: u64) -> &BlockSlot {
        &self.blocks[self.directory.resolve(key)]
    }

    fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|slot| slot.id).collect()
    }

    fn write_block(&mut self, position: BlockRef) -> Result<()> {
        let route = self.directory.route_of(position);
        let slot = &mut self.blocks[position];

        self.store
            .write_block(slot.id, &meta::encode_block_frame(route, &slot.block))?;
        slot.dirty = false;
        Ok(())
    }

    fn write_meta_with(&self, blocks: Vec<BlockId>) -> Result<()> {
        let meta = IndexMeta::new(&self.config, blocks);
        self.store.write_block(META_BLOCK_ID, &meta.encode()?)
    }

    fn write_meta(&mut self) -> Result<()> {
        self.write_meta_with(self.block_ids())?;
        self.meta_dirty = false;
        Ok(())
    }
}
