//! Shared index handle
//!
//! Serializes writers and lets readers proceed concurrently, for callers that
//! need one index across threads.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::error::{IndexError, Result};
use crate::store::BlockStore;

use super::{HashIndex, IndexStats};

/// Cloneable, thread-safe handle to a `HashIndex`
///
/// ## Concurrency:
/// - `get`/`contains_key`/`len`/`block_count`/`stats`: read lock
/// - `put`/`remove`/`clear`/`flush`/`reopen`: write lock (one at a time)
pub struct SharedIndex<S: BlockStore> {
    inner: Arc<RwLock<HashIndex<S>>>,
}

impl<S: BlockStore> Clone for SharedIndex<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: BlockStore> SharedIndex<S> {
    pub fn new(index: HashIndex<S>) -> Self {
        Self { inner: Arc::new(RwLock::new(index)) }
    }

    pub fn get(&self, key: u64) -> Option<Vec<u8>> {
        self.inner.read().get(key)
    }

    pub fn contains_key(&self, key: u64) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn put(&self, key: u64, value: &[u8]) -> Result<bool> {
        self.inner.write().put(key, value)
    }

    pub fn remove(&self, key: u64) -> Option<Vec<u8>> {
        self.inner.write().remove(key)
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.write().clear()
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.write().flush()
    }

    pub fn reopen(&self) -> Result<()> {
        self.inner.write().reopen()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn block_count(&self) -> usize {
        self.inner.read().block_count()
    }

    pub fn stats(&self) -> IndexStats {
        self.inner.read().stats()
    }

    /// Hold the read lock for several reads in a row
    pub fn read(&self) -> RwLockReadGuard<'_, HashIndex<S>> {
        self.inner.read()
    }

    /// Close the index. Fails if other handles are still alive.
    pub fn close(self) -> Result<()> {
        let others = Arc::strong_count(&self.inner) - 1;

        match Arc::try_unwrap(self.inner) {
            Ok(lock) => lock.into_inner().close(),
            Err(_) => Err(IndexError::StillShared(others)),
        }
    }
}
