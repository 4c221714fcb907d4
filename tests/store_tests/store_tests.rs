//! Tests for block stores
//!
//! These tests verify, for both the memory and file store:
//! - Dense id allocation and zero-filled blocks
//! - Write/read with padding, oversized writes rejected
//! - Truncate, close, unknown ids
//! - File store persistence across reopen and torn tail handling

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use splitkv::{BlockStore, FileBlockStore, IndexError, MemoryBlockStore};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_file() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("blocks.idx");
    (temp_dir, path)
}

/// Contract checks shared by every store implementation
fn check_store_contract(store: &dyn BlockStore) {
    assert_eq!(store.block_count(), 0);

    let a = store.allocate_block(16).unwrap();
    let b = store.allocate_block(32).unwrap();
    assert_eq!((a, b), (0, 1));
    assert_eq!(store.block_count(), 2);

    // Fresh blocks are zero filled at their allocated size
    assert_eq!(store.read_block(a).unwrap(), vec![0u8; 16]);
    assert_eq!(store.read_block(b).unwrap(), vec![0u8; 32]);

    store.write_block(b, b"hello").unwrap();
    let read = store.read_block(b).unwrap();
    assert_eq!(read.len(), 32);
    assert_eq!(&read[..5], b"hello");
    assert!(read[5..].iter().all(|byte| *byte == 0));

    // A shorter rewrite clears the old tail
    store.write_block(b, b"hi").unwrap();
    let read = store.read_block(b).unwrap();
    assert_eq!(&read[..5], b"hi\0\0\0");

    // Neighbouring block untouched
    assert_eq!(store.read_block(a).unwrap(), vec![0u8; 16]);

    // Oversized write rejected
    let result = store.write_block(a, &[1u8; 17]);
    assert!(matches!(result, Err(IndexError::Storage(_))));

    // Unknown ids
    assert!(matches!(store.read_block(9), Err(IndexError::UnknownBlock(9))));
    assert!(matches!(store.write_block(9, b"x"), Err(IndexError::UnknownBlock(9))));

    store.flush().unwrap();

    // Truncate restarts allocation at 0
    store.truncate().unwrap();
    assert_eq!(store.block_count(), 0);
    assert_eq!(store.allocate_block(8).unwrap(), 0);

    // Closed store rejects everything
    store.close().unwrap();
    assert!(matches!(store.allocate_block(8), Err(IndexError::StoreClosed)));
    assert!(matches!(store.flush(), Err(IndexError::StoreClosed)));
}

// =============================================================================
// Contract Tests
// =============================================================================

#[test]
fn test_memory_store_contract() {
    let store = MemoryBlockStore::new();
    check_store_contract(&store);
}

#[test]
fn test_file_store_contract() {
    let (_temp, path) = setup_temp_file();
    let store = FileBlockStore::open(&path).unwrap();
    check_store_contract(&store);
}

// =============================================================================
// File Store Tests
// =============================================================================

#[test]
fn test_file_store_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("dir").join("blocks.idx");

    let store = FileBlockStore::open(&path).unwrap();

    assert!(path.exists());
    assert_eq!(store.path(), path.as_path());
}

#[test]
fn test_file_store_persists_across_reopen() {
    let (_temp, path) = setup_temp_file();

    {
        let store = FileBlockStore::open(&path).unwrap();
        let a = store.allocate_block(8).unwrap();
        let b = store.allocate_block(12).unwrap();
        store.write_block(a, b"first").unwrap();
        store.write_block(b, b"second").unwrap();
        store.flush().unwrap();
        store.close().unwrap();
    }

    let store = FileBlockStore::open(&path).unwrap();
    assert_eq!(store.block_count(), 2);
    assert_eq!(&store.read_block(0).unwrap()[..5], b"first");
    assert_eq!(&store.read_block(1).unwrap()[..6], b"second");
    assert_eq!(store.read_block(1).unwrap().len(), 12);

    // Allocation continues after the existing frames
    assert_eq!(store.allocate_block(4).unwrap(), 2);
}

#[test]
fn test_file_store_truncates_torn_tail() {
    let (_temp, path) = setup_temp_file();

    {
        let store = FileBlockStore::open(&path).unwrap();
        let id = store.allocate_block(8).unwrap();
        store.write_block(id, b"intact").unwrap();
        store.flush().unwrap();
    }

    let intact_len = std::fs::metadata(&path).unwrap().len();

    // Simulate a crash halfway through appending a 100-byte frame
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&100u32.to_le_bytes()).unwrap();
        file.write_all(&[7u8; 10]).unwrap();
        file.sync_all().unwrap();
    }

    let store = FileBlockStore::open(&path).unwrap();
    assert_eq!(store.block_count(), 1);
    assert_eq!(&store.read_block(0).unwrap()[..6], b"intact");
    assert_eq!(std::fs::metadata(&path).unwrap().len(), intact_len);
}

#[test]
fn test_file_store_rejects_bad_magic() {
    let (_temp, path) = setup_temp_file();
    std::fs::write(&path, b"NOPE\x01\x00\x00\x00").unwrap();

    let result = FileBlockStore::open(&path);
    assert!(matches!(result, Err(IndexError::Corruption(_))));
}

#[test]
fn test_file_store_truncate_survives_reopen() {
    let (_temp, path) = setup_temp_file();

    {
        let store = FileBlockStore::open(&path).unwrap();
        store.allocate_block(8).unwrap();
        store.allocate_block(8).unwrap();
        store.truncate().unwrap();
    }

    let store = FileBlockStore::open(&path).unwrap();
    assert_eq!(store.block_count(), 0);
}
