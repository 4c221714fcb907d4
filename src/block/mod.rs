//! Block Module
//!
//! Fixed-capacity container of (key, value) entries and its binary encoding.
//! A block knows nothing about routing: local depth and prefix live in the
//! directory and are framed around the block by the index when persisting.
//!
//! ## Encoding
//! ```text
//! ┌──────────────┬─────────────────────────────────────────┐
//! │ Count (4)    │ [Key: u64 LE (8)][Value (value_length)]  │
//! │              │ ... repeated `count` times ...           │
//! └──────────────┴─────────────────────────────────────────┘
//! ```

mod value;

use bytes::{Buf, BufMut};

use crate::error::{IndexError, Result};

pub use value::{EntryLayout, FixedValue, KEY_SIZE};

/// Size of the entry count header
pub const COUNT_HEADER_SIZE: usize = 4;

/// Result of inserting into a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key existed; its value was overwritten
    Replaced,
    /// The key was new and there was room for it
    Inserted,
    /// The key is new and the block has no room; the caller must split
    Full,
}

/// A fixed-capacity set of entries with unique keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    layout: EntryLayout,
    capacity: usize,
    entries: Vec<(u64, FixedValue)>,
}

impl Block {
    /// Create an empty block
    pub fn new(layout: EntryLayout, capacity: usize) -> Self {
        Self {
            layout,
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Look up a key
    pub fn get(&self, key: u64) -> Option<&FixedValue> {
        self.position(key).map(|pos| &self.entries[pos].1)
    }

    /// Insert or overwrite a key. Never evicts and never grows past capacity.
    pub fn put(&mut self, key: u64, value: FixedValue) -> InsertOutcome {
        if let Some(pos) = self.position(key) {
            self.entries[pos].1 = value;
            return InsertOutcome::Replaced;
        }

        if self.is_full() {
            return InsertOutcome::Full;
        }

        self.entries.push((key, value));
        InsertOutcome::Inserted
    }

    /// Remove a key, keeping the remaining entries in order
    pub fn remove(&mut self, key: u64) -> Option<FixedValue> {
        self.position(key).map(|pos| self.entries.remove(pos).1)
    }

    /// All entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (u64, &FixedValue)> + '_ {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    /// Split the entries on bit `bit` of their keys.
    ///
    /// Returns `(stay, moved)`: keys with the bit clear, keys with it set.
    /// `self` is left untouched so nothing changes until the caller commits.
    pub fn partition(&self, bit: u32) -> (Block, Block) {
        let mut stay = Block::new(self.layout, self.capacity);
        let mut moved = Block::new(self.layout, self.capacity);

        for (key, value) in &self.entries {
            let target = if (key >> bit) & 1 == 0 { &mut stay } else { &mut moved };
            target.entries.push((*key, value.clone()));
        }

        (stay, moved)
    }

    /// Keep only the entries for which `keep` returns true.
    /// Returns the number of entries dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(u64) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(key, _)| keep(*key));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn layout(&self) -> EntryLayout {
        self.layout
    }

    /// Size of `encode()` output for a block holding `capacity` entries
    pub fn encoded_size(layout: EntryLayout, capacity: usize) -> usize {
        COUNT_HEADER_SIZE + capacity * layout.entry_size()
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Encode as count header followed by packed entries
    pub fn encode(&self) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(COUNT_HEADER_SIZE + self.entries.len() * self.layout.entry_size());

        buf.put_u32_le(self.entries.len() as u32);
        for (key, value) in &self.entries {
            buf.put_u64_le(*key);
            buf.put_slice(value.as_bytes());
        }

        buf
    }

    /// Decode a block from `bytes`; trailing bytes past the last entry are ignored
    pub fn decode(mut bytes: &[u8], layout: EntryLayout, capacity: usize) -> Result<Self> {
        if bytes.remaining() < COUNT_HEADER_SIZE {
            return Err(IndexError::Corruption(format!(
                "Block too short: {} bytes",
                bytes.remaining()
            )));
        }

        let count = bytes.get_u32_le() as usize;
        if count > capacity {
            return Err(IndexError::Corruption(format!(
                "Block holds {} entries but capacity is {}",
                count, capacity
            )));
        }

        let needed = count * layout.entry_size();
        if bytes.remaining() < needed {
            return Err(IndexError::Corruption(format!(
                "Block truncated: need {} entry bytes, got {}",
                needed,
                bytes.remaining()
            )));
        }

        let mut block = Block::new(layout, capacity);
        for _ in 0..count {
            let key = bytes.get_u64_le();
            let value = layout.value_from(bytes.copy_to_bytes(layout.value_length()))?;

            if block.position(key).is_some() {
                return Err(IndexError::Corruption(format!(
                    "Duplicate key {} in block",
                    key
                )));
            }
            block.entries.push((key, value));
        }

        Ok(block)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn position(&self, key: u64) -> Option<usize> {
        self.entries.iter().position(|(k, _)| *k == key)
    }
}
