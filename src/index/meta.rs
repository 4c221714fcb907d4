//! On-disk framing for the index
//!
//! Two kinds of blocks live in the store: one metadata block describing the
//! index, and data blocks wrapped in a routing header.
//!
//! ## Metadata Block (store id 0)
//! ```text
//! ┌──────────┬──────────┬──────────────────────────────────────────┐
//! │ Len (4)  │ CRC (4)  │ bincode(IndexMeta)                       │
//! └──────────┴──────────┴──────────────────────────────────────────┘
//! ```
//!
//! ## Data Block Frame
//! ```text
//! ┌────────────┬──────────┬─────────────┬──────────────────────────┐
//! │ Depth (4)  │ CRC (4)  │ Prefix (8)  │ Block encoding           │
//! └────────────┴──────────┴─────────────┴──────────────────────────┘
//! ```
//! The CRC covers the block encoding. Depth and prefix make each block
//! self-describing, so the directory can be rebuilt from the blocks alone.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::block::{Block, EntryLayout};
use crate::config::IndexConfig;
use crate::directory::Route;
use crate::error::{IndexError, Result};
use crate::store::BlockId;

/// Size of the routing header in front of every data block
pub const ROUTE_HEADER_SIZE: usize = 16;

/// Store id of the metadata block
pub const META_BLOCK_ID: BlockId = 0;

/// Store id of the first data block of a fresh index
pub const FIRST_BLOCK_ID: BlockId = 1;

/// "SKIX"
const META_MAGIC: u32 = 0x534B_4958;

/// Current metadata format version
const META_VERSION: u16 = 1;

/// Len (4) + CRC (4)
const META_FRAME_HEADER_SIZE: usize = 8;

/// Upper bound on the bincode size of `IndexMeta` without its block list
const META_FIXED_SIZE: usize = 64;

/// Persistent description of an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    magic: u32,
    version: u16,
    pub table_size: u64,
    pub value_length: u32,
    pub block_size: u32,
    /// Store ids of all data blocks, in arena order
    pub blocks: Vec<BlockId>,
}

impl IndexMeta {
    pub fn new(config: &IndexConfig, blocks: Vec<BlockId>) -> Self {
        Self {
            magic: META_MAGIC,
            version: META_VERSION,
            table_size: config.table_size() as u64,
            value_length: config.value_length as u32,
            block_size: config.block_size as u32,
            blocks,
        }
    }

    /// Configuration this metadata was written with
    pub fn config(&self) -> IndexConfig {
        IndexConfig {
            index_size: self.table_size as usize,
            value_length: self.value_length as usize,
            block_size: self.block_size as usize,
        }
    }

    /// Bytes to allocate for the metadata block: room for one id per slot,
    /// since the directory can never route to more blocks than that
    pub fn allocation_size(table_size: usize) -> usize {
        META_FRAME_HEADER_SIZE + META_FIXED_SIZE + table_size * std::mem::size_of::<BlockId>()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;

        let mut buf = Vec::with_capacity(META_FRAME_HEADER_SIZE + payload.len());
        buf.put_u32_le(payload.len() as u32);
        buf.put_u32_le(crc32fast::hash(&payload));
        buf.put_slice(&payload);

        Ok(buf)
    }

    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        if bytes.remaining() < META_FRAME_HEADER_SIZE {
            return Err(IndexError::Corruption("Metadata block too short".to_string()));
        }

        let len = bytes.get_u32_le() as usize;
        let crc = bytes.get_u32_le();

        if bytes.remaining() < len {
            return Err(IndexError::Corruption(format!(
                "Metadata truncated: need {} bytes, got {}",
                len,
                bytes.remaining()
            )));
        }

        let payload = &bytes[..len];
        if crc32fast::hash(payload) != crc {
            return Err(IndexError::Corruption("Metadata checksum mismatch".to_string()));
        }

        let meta: IndexMeta = bincode::deserialize(payload)?;
        if meta.magic != META_MAGIC {
            return Err(IndexError::Corruption(format!(
                "Invalid index magic: {:#010x}",
                meta.magic
            )));
        }
        if meta.version != META_VERSION {
            return Err(IndexError::Corruption(format!(
                "Unsupported index version: {}",
                meta.version
            )));
        }

        Ok(meta)
    }
}

/// Wrap a block in its routing header
pub fn encode_block_frame(route: Route, block: &Block) -> Vec<u8> {
    let body = block.encode();

    let mut buf = Vec::with_capacity(ROUTE_HEADER_SIZE + body.len());
    buf.put_u32_le(route.depth);
    buf.put_u32_le(crc32fast::hash(&body));
    buf.put_u64_le(route.prefix);
    buf.put_slice(&body);

    buf
}

/// Parse a data block frame read back from the store
pub fn decode_block_frame(
    mut bytes: &[u8],
    layout: EntryLayout,
    capacity: usize,
) -> Result<(Route, Block)> {
    if bytes.remaining() < ROUTE_HEADER_SIZE {
        return Err(IndexError::Corruption("Block frame too short".to_string()));
    }

    let depth = bytes.get_u32_le();
    let crc = bytes.get_u32_le();
    let prefix = bytes.get_u64_le();

    let block = Block::decode(bytes, layout, capacity)?;
    let body_len = Block::encoded_size(layout, block.len());
    if crc32fast::hash(&bytes[..body_len]) != crc {
        return Err(IndexError::Corruption(format!(
            "Block checksum mismatch (depth {}, prefix {})",
            depth, prefix
        )));
    }

    Ok((Route { depth, prefix }, block))
}
