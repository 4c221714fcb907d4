//! # splitkv
//!
//! A persistent splitting hash index mapping `u64` keys to fixed-length values:
//! - Fixed-size directory routing the low-order key bits to blocks
//! - Incremental growth by (cascading) block splits, no full rehash
//! - Single-writer/multi-reader concurrency model
//! - Pluggable block store (in-memory or single file)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        HashIndex                            │
//! │          get / put / remove / clear / flush / reopen        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Directory  │          │   Blocks    │
//!   │ (key bits → │          │   (arena)   │
//!   │   block)    │          └──────┬──────┘
//!   └─────────────┘                 │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │ BlockStore  │
//!                           │ (file/mem)  │
//!                           └─────────────┘
//! ```
//!
//! ## Capacity
//!
//! The directory size is fixed at creation, so it bounds the number of
//! blocks. Keys that agree on every directory bit cannot be separated and
//! fail with `IndexError::IndexFull` once their block is full.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod block;
pub mod directory;
pub mod store;
pub mod index;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{IndexError, Result};
pub use config::IndexConfig;
pub use index::{HashIndex, IndexStats, SharedIndex};
pub use store::{BlockId, BlockStore, FileBlockStore, MemoryBlockStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of splitkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
