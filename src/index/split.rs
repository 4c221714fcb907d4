//! Block split
//!
//! Divides a full block between itself and a newly allocated block on the next
//! key bit, and updates the directory.
//!
//! ## Write Order
//! 1. New block (bit-set half), then flush
//! 2. Metadata block listing the new block, then flush
//! 3. Old block (bit-clear half)
//! 4. In-memory arena + directory
//!
//! The metadata only references the new block once its contents are durable,
//! and the old block only shrinks once the metadata is durable.
//!
//! A failure at 1–3 returns before step 4, so the in-memory index is untouched.
//! A crash between 2 and 3 leaves the old block on disk at its old depth with
//! stale copies of the moved keys; recovery resolves that because the deeper
//! new block overrides its slots and stray entries are pruned.
//!
//! ## Spare Blocks
//! A block allocated for a split that then fails is kept as a spare and used
//! by the next split. Recovery also treats allocated blocks the metadata does
//! not list as spares, so failed splits do not grow the store.

use tracing::debug;

use crate::block::Block;
use crate::directory::{BlockRef, Route};
use crate::error::{IndexError, Result};
use crate::store::{BlockId, BlockStore};

use super::meta::encode_block_frame;
use super::{BlockSlot, HashIndex};

impl<S: BlockStore> HashIndex<S> {
    /// Split `target`, which is full and must make room for `key`
    pub(super) fn split(&mut self, target: BlockRef, key: u64) -> Result<()> {
        let route = self.directory.route_of(target);
        if route.depth >= self.directory.global_depth() {
            return Err(IndexError::IndexFull { key, depth: route.depth });
        }

        let split_bit = route.depth;
        let (stay_route, moved_route) = route.children();
        let (stay, moved) = self.blocks[target].block.partition(split_bit);

        let new_id = match self.spare_blocks.pop() {
            Some(id) => id,
            None => self.store.allocate_block(self.config.block_size)?,
        };

        let old_id = self.blocks[target].id;
        let persisted =
            self.persist_split(old_id, stay_route, &stay, new_id, moved_route, &moved);
        if let Err(e) = persisted {
            self.spare_blocks.push(new_id);
            return Err(e);
        }

        debug!(
            key,
            old_block = old_id,
            new_block = new_id,
            depth = stay_route.depth,
            moved = moved.len(),
            kept = stay.len(),
            "Split block"
        );

        let old = &mut self.blocks[target];
        old.block = stay;
        old.dirty = false;

        self.blocks.push(BlockSlot { id: new_id, block: moved, dirty: false });
        let new_ref = self.directory.commit_split(target);
        debug_assert_eq!(new_ref + 1, self.blocks.len());
        self.meta_dirty = false;

        Ok(())
    }

    fn persist_split(
        &mut self,
        old_id: BlockId,
        stay_route: Route,
        stay: &Block,
        new_id: BlockId,
        moved_route: Route,
        moved: &Block,
    ) -> Result<()> {
        self.store
            .write_block(new_id, &encode_block_frame(moved_route, moved))?;
        self.store.flush()?;

        // Stored metadata lists the new block before the split commits
        self.meta_dirty = true;
        let mut ids = self.block_ids();
        ids.push(new_id);
        self.write_meta_with(ids)?;
        self.store.flush()?;

        self.store
            .write_block(old_id, &encode_block_frame(stay_route, stay))
    }
}
