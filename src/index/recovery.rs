//! Index recovery
//!
//! Rebuilds the in-memory index from what is persisted in the store:
//! 1. Read and validate the metadata block
//! 2. Read every listed data block and its routing header
//! 3. Rebuild the directory (deeper routes override shallower ones)
//! 4. Drop entries that no longer route to the block holding them
//! 5. Collect allocated blocks the metadata does not list for reuse
//!
//! Blocks whose route or contents changed during 3–4 are marked dirty so the
//! next flush writes the repaired state back.

use std::collections::HashSet;

use tracing::warn;

use crate::config::IndexConfig;
use crate::directory::Directory;
use crate::error::{IndexError, Result};
use crate::store::{BlockId, BlockStore};

use super::meta::{decode_block_frame, IndexMeta, FIRST_BLOCK_ID, META_BLOCK_ID};
use super::BlockSlot;

/// In-memory state reconstructed from a store
pub(super) struct LoadedIndex {
    pub config: IndexConfig,
    pub directory: Directory,
    pub blocks: Vec<BlockSlot>,
    /// Allocated data blocks the metadata does not list
    pub spare_blocks: Vec<BlockId>,
}

pub(super) fn load<S: BlockStore>(store: &S) -> Result<LoadedIndex> {
    if store.block_count() == 0 {
        return Err(IndexError::Corruption(
            "Block store holds no index metadata".to_string(),
        ));
    }

    let meta = IndexMeta::decode(&store.read_block(META_BLOCK_ID)?)?;
    let config = meta.config();
    config.validate()?;

    if !config.index_size.is_power_of_two() {
        return Err(IndexError::Corruption(format!(
            "Persisted table size {} is not a power of two",
            config.index_size
        )));
    }
    if meta.blocks.is_empty() || meta.blocks.len() > config.table_size() {
        return Err(IndexError::Corruption(format!(
            "Metadata lists {} blocks for a table of {} slots",
            meta.blocks.len(),
            config.table_size()
        )));
    }

    let layout = config.layout();
    let capacity = config.block_capacity();

    let mut routes = Vec::with_capacity(meta.blocks.len());
    let mut blocks = Vec::with_capacity(meta.blocks.len());
    for &id in &meta.blocks {
        let bytes = store.read_block(id)?;
        let (route, block) = decode_block_frame(&bytes, layout, capacity).map_err(|e| {
            IndexError::Corruption(format!("Block {}: {}", id, e))
        })?;

        routes.push(route);
        blocks.push(BlockSlot { id, block, dirty: false });
    }

    let (directory, normalized) = Directory::rebuild(config.table_size(), &routes)?;

    for position in normalized {
        warn!(
            block = blocks[position].id,
            persisted = ?routes[position],
            recovered = ?directory.route_of(position),
            "Recovered block route differs from persisted header"
        );
        blocks[position].dirty = true;
    }

    for (position, slot) in blocks.iter_mut().enumerate() {
        let route = directory.route_of(position);
        let dropped = slot.block.retain(|key| route.matches(key));

        if dropped > 0 {
            warn!(
                block = slot.id,
                dropped,
                "Pruned entries left behind by an interrupted split"
            );
            slot.dirty = true;
        }
    }

    // Left behind by splits that failed or crashed before committing
    let listed: HashSet<BlockId> = meta.blocks.iter().copied().collect();
    let spare_blocks: Vec<BlockId> = (FIRST_BLOCK_ID..store.block_count() as BlockId)
        .filter(|id| !listed.contains(id))
        .collect();

    if !spare_blocks.is_empty() {
        warn!(count = spare_blocks.len(), "Reclaiming unreferenced blocks");
    }

    Ok(LoadedIndex { config, directory, blocks, spare_blocks })
}
