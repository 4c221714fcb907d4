//! Directory
//!
//! Fixed-size routing table from the low-order bits of a key to a block.
//!
//! ## Invariant
//! `table_size = 2^global_depth`. A block with route `(depth, prefix)` is
//! referenced by exactly the `2^(global_depth - depth)` slots whose low
//! `depth` bits equal `prefix`. The slot array is allocated at full size and
//! never grows; splitting only reassigns existing slots.

use crate::error::{IndexError, Result};

/// Position of a block in the index's block arena
pub type BlockRef = usize;

/// Routing metadata of one block: how many low key bits select it, and their value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub depth: u32,
    pub prefix: u64,
}

impl Route {
    /// Route of the single block every slot points at initially
    pub fn root() -> Self {
        Self { depth: 0, prefix: 0 }
    }

    pub fn mask(&self) -> u64 {
        mask(self.depth)
    }

    /// Whether a key or slot index with these low bits routes here
    pub fn matches(&self, bits: u64) -> bool {
        bits & self.mask() == self.prefix
    }

    /// Routes of the two halves after a split: `(bit clear, bit set)`
    pub fn children(&self) -> (Route, Route) {
        let depth = self.depth + 1;
        (
            Route { depth, prefix: self.prefix },
            Route { depth, prefix: self.prefix | 1 << self.depth },
        )
    }
}

/// Routing table plus per-block depth bookkeeping
#[derive(Debug, Clone)]
pub struct Directory {
    /// `slots[i]` is the block that keys with low bits `i` route to
    slots: Vec<BlockRef>,

    /// Route of every block, indexed by `BlockRef`
    routes: Vec<Route>,

    global_depth: u32,
}

impl Directory {
    /// Create a directory with every slot routed to block 0
    ///
    /// `table_size` must be a power of two.
    pub fn new(table_size: usize) -> Self {
        debug_assert!(table_size.is_power_of_two());

        Self {
            slots: vec![0; table_size],
            routes: vec![Route::root()],
            global_depth: table_size.trailing_zeros(),
        }
    }

    /// Block that `key` routes to
    pub fn resolve(&self, key: u64) -> BlockRef {
        self.slots[self.slot_of(key)]
    }

    /// Slot index for `key`: its low `global_depth` bits
    pub fn slot_of(&self, key: u64) -> usize {
        (key & (self.slots.len() as u64 - 1)) as usize
    }

    pub fn local_depth_of(&self, block: BlockRef) -> u32 {
        self.routes[block].depth
    }

    pub fn route_of(&self, block: BlockRef) -> Route {
        self.routes[block]
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Point every slot of `old` whose bit `split_bit` is set at `new`
    pub fn reassign(&mut self, old: BlockRef, new: BlockRef, split_bit: u32) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if *slot == old && (index >> split_bit) & 1 == 1 {
                *slot = new;
            }
        }
    }

    /// Record a completed split of `old`.
    ///
    /// `old` keeps the bit-clear half, a new block takes the bit-set half.
    /// Returns the new block's reference, which is always `block_count()`
    /// before the call.
    pub fn commit_split(&mut self, old: BlockRef) -> BlockRef {
        let route = self.routes[old];
        debug_assert!(route.depth < self.global_depth);

        let (stay, moved) = route.children();
        let new = self.routes.len();

        self.routes[old] = stay;
        self.routes.push(moved);
        self.reassign(old, new, route.depth);

        new
    }

    /// Number of slots referencing `block`
    pub fn slot_count(&self, block: BlockRef) -> usize {
        self.slots.iter().filter(|slot| **slot == block).count()
    }

    pub fn table_size(&self) -> usize {
        self.slots.len()
    }

    pub fn global_depth(&self) -> u32 {
        self.global_depth
    }

    /// Number of distinct blocks the directory routes to
    pub fn block_count(&self) -> usize {
        self.routes.len()
    }

    /// Verify the routing invariant for every block
    pub fn check_invariants(&self) -> Result<()> {
        let mut counts = vec![0usize; self.routes.len()];

        for (index, &block) in self.slots.iter().enumerate() {
            let route = self.routes.get(block).ok_or_else(|| {
                IndexError::Corruption(format!("Slot {} references unknown block {}", index, block))
            })?;
            if !route.matches(index as u64) {
                return Err(IndexError::Corruption(format!(
                    "Slot {} does not match route {:?} of block {}",
                    index, route, block
                )));
            }
            counts[block] += 1;
        }

        for (block, (route, count)) in self.routes.iter().zip(&counts).enumerate() {
            let expected = 1usize << (self.global_depth - route.depth);
            if *count != expected {
                return Err(IndexError::Corruption(format!(
                    "Block {} at depth {} has {} slots, expected {}",
                    block, route.depth, count, expected
                )));
            }
        }

        Ok(())
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Rebuild a directory from persisted routes.
    ///
    /// Routes are applied shallowest first so a deeper route overrides the
    /// slots of a shallower one it was split from. Each block's route is then
    /// recomputed from the slots it actually owns. Returns the directory and
    /// the blocks whose route changed in the process.
    pub fn rebuild(table_size: usize, routes: &[Route]) -> Result<(Self, Vec<BlockRef>)> {
        debug_assert!(table_size.is_power_of_two());
        let global_depth = table_size.trailing_zeros();

        let mut order: Vec<BlockRef> = (0..routes.len()).collect();
        order.sort_by_key(|&block| routes[block].depth);

        let mut slots = vec![BlockRef::MAX; table_size];
        for block in order {
            let route = routes[block];
            if route.depth > global_depth || route.prefix > route.mask() {
                return Err(IndexError::Corruption(format!(
                    "Block {} has invalid route {:?} for global depth {}",
                    block, route, global_depth
                )));
            }

            let stride = 1usize << route.depth;
            for slot in (route.prefix as usize..table_size).step_by(stride) {
                slots[slot] = block;
            }
        }

        let mut counts = vec![0usize; routes.len()];
        let mut first = vec![0usize; routes.len()];
        for (index, &block) in slots.iter().enumerate().rev() {
            if block == BlockRef::MAX {
                return Err(IndexError::Corruption(format!("Slot {} routes to no block", index)));
            }
            counts[block] += 1;
            first[block] = index;
        }

        let mut rebuilt = Vec::with_capacity(routes.len());
        let mut normalized = Vec::new();
        for (block, &count) in counts.iter().enumerate() {
            if count == 0 || !count.is_power_of_two() {
                return Err(IndexError::Corruption(format!(
                    "Block {} owns {} slots",
                    block, count
                )));
            }

            let depth = global_depth - count.trailing_zeros();
            let route = Route { depth, prefix: first[block] as u64 & mask(depth) };
            if route != routes[block] {
                normalized.push(block);
            }
            rebuilt.push(route);
        }

        let directory = Self { slots, routes: rebuilt, global_depth };
        directory.check_invariants()?;

        Ok((directory, normalized))
    }
}

fn mask(depth: u32) -> u64 {
    if depth >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << depth) - 1
    }
}
