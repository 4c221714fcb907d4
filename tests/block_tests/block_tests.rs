//! Tests for Block
//!
//! These tests verify:
//! - Insert/replace/full outcomes
//! - Removal with compaction
//! - Partitioning on a key bit
//! - Binary encoding and corruption detection
//! - FixedValue length checks

use splitkv::block::{Block, EntryLayout, InsertOutcome, COUNT_HEADER_SIZE};
use splitkv::IndexError;

// =============================================================================
// Helper Functions
// =============================================================================

const VALUE_LENGTH: usize = 3;

fn layout() -> EntryLayout {
    EntryLayout::new(VALUE_LENGTH)
}

fn block_with(capacity: usize, entries: &[(u64, &[u8])]) -> Block {
    let mut block = Block::new(layout(), capacity);
    for (key, value) in entries {
        let outcome = block.put(*key, layout().value(value).unwrap());
        assert_eq!(outcome, InsertOutcome::Inserted);
    }
    block
}

// =============================================================================
// FixedValue Tests
// =============================================================================

#[test]
fn test_value_exact_length_accepted() {
    let value = layout().value(b"bar").unwrap();
    assert_eq!(value.as_bytes(), b"bar");
    assert_eq!(value.len(), 3);
}

#[test]
fn test_value_wrong_length_rejected() {
    match layout().value(b"too long") {
        Err(IndexError::ValueTooLong { expected, actual }) => {
            assert_eq!(expected, 3);
            assert_eq!(actual, 8);
        }
        other => panic!("expected ValueTooLong, got {:?}", other),
    }

    assert!(matches!(layout().value(b"ab"), Err(IndexError::ValueTooLong { .. })));
}

#[test]
fn test_entry_size() {
    assert_eq!(layout().entry_size(), 8 + 3);
}

// =============================================================================
// Put/Get Tests
// =============================================================================

#[test]
fn test_get_empty_block() {
    let block = Block::new(layout(), 4);
    assert!(block.get(0).is_none());
    assert!(block.is_empty());
}

#[test]
fn test_put_then_get() {
    let block = block_with(4, &[(1, b"bar"), (2, b"plo")]);

    assert_eq!(block.get(1).unwrap().as_bytes(), b"bar");
    assert_eq!(block.get(2).unwrap().as_bytes(), b"plo");
    assert!(block.get(3).is_none());
    assert_eq!(block.len(), 2);
}

#[test]
fn test_put_existing_key_replaces() {
    let mut block = block_with(1, &[(7, b"bar")]);

    // Replacing works even when the block is full
    let outcome = block.put(7, layout().value(b"plo").unwrap());

    assert_eq!(outcome, InsertOutcome::Replaced);
    assert_eq!(block.get(7).unwrap().as_bytes(), b"plo");
    assert_eq!(block.len(), 1);
}

#[test]
fn test_put_into_full_block_reports_full() {
    let mut block = block_with(2, &[(1, b"aaa"), (2, b"bbb")]);
    assert!(block.is_full());

    let outcome = block.put(3, layout().value(b"ccc").unwrap());

    assert_eq!(outcome, InsertOutcome::Full);
    assert!(block.get(3).is_none());
    assert_eq!(block.len(), 2);
}

// =============================================================================
// Remove Tests
// =============================================================================

#[test]
fn test_remove_present_key() {
    let mut block = block_with(4, &[(1, b"aaa"), (2, b"bbb"), (3, b"ccc")]);

    let removed = block.remove(2).unwrap();

    assert_eq!(removed.as_bytes(), b"bbb");
    assert!(block.get(2).is_none());
    let keys: Vec<u64> = block.entries().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![1, 3]);
}

#[test]
fn test_remove_absent_key() {
    let mut block = block_with(4, &[(1, b"aaa")]);

    assert!(block.remove(9).is_none());
    assert_eq!(block.len(), 1);
}

#[test]
fn test_remove_frees_capacity() {
    let mut block = block_with(1, &[(1, b"aaa")]);
    block.remove(1);

    let outcome = block.put(2, layout().value(b"bbb").unwrap());
    assert_eq!(outcome, InsertOutcome::Inserted);
}

// =============================================================================
// Partition / Retain Tests
// =============================================================================

#[test]
fn test_partition_on_bit() {
    let block = block_with(4, &[(0b00, b"aaa"), (0b01, b"bbb"), (0b10, b"ccc"), (0b11, b"ddd")]);

    let (low, high) = block.partition(1);

    let low_keys: Vec<u64> = low.entries().map(|(k, _)| k).collect();
    let high_keys: Vec<u64> = high.entries().map(|(k, _)| k).collect();
    assert_eq!(low_keys, vec![0b00, 0b01]);
    assert_eq!(high_keys, vec![0b10, 0b11]);

    // Original untouched, halves keep the capacity
    assert_eq!(block.len(), 4);
    assert_eq!(low.capacity(), 4);
    assert_eq!(high.get(0b11).unwrap().as_bytes(), b"ddd");
}

#[test]
fn test_partition_all_one_side() {
    let block = block_with(2, &[(1, b"aaa"), (3, b"bbb")]);

    let (stay, moved) = block.partition(0);

    assert!(stay.is_empty());
    assert_eq!(moved.len(), 2);
}

#[test]
fn test_retain_drops_rejected_keys() {
    let mut block = block_with(4, &[(1, b"aaa"), (2, b"bbb"), (3, b"ccc")]);

    let dropped = block.retain(|key| key % 2 == 1);

    assert_eq!(dropped, 1);
    assert!(block.get(2).is_none());
    assert!(block.get(3).is_some());
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_layout() {
    let block = block_with(4, &[(0x0102, b"bar")]);

    let bytes = block.encode();

    assert_eq!(bytes.len(), COUNT_HEADER_SIZE + 11);
    assert_eq!(&bytes[0..4], &1u32.to_le_bytes());
    assert_eq!(&bytes[4..12], &0x0102u64.to_le_bytes());
    assert_eq!(&bytes[12..15], b"bar");
}

#[test]
fn test_decode_encoded_block_with_padding() {
    let block = block_with(4, &[(5, b"aaa"), (6, b"bbb")]);

    let mut bytes = block.encode();
    bytes.resize(Block::encoded_size(layout(), 4), 0);

    let decoded = Block::decode(&bytes, layout(), 4).unwrap();
    assert_eq!(decoded, block);
}

#[test]
fn test_decode_empty_block() {
    let decoded = Block::decode(&[0u8; 4], layout(), 2).unwrap();
    assert!(decoded.is_empty());
    assert_eq!(decoded.capacity(), 2);
}

#[test]
fn test_decode_too_short() {
    let result = Block::decode(&[1, 0], layout(), 2);
    assert!(matches!(result, Err(IndexError::Corruption(_))));
}

#[test]
fn test_decode_count_over_capacity() {
    let block = block_with(3, &[(1, b"aaa"), (2, b"bbb"), (3, b"ccc")]);

    let result = Block::decode(&block.encode(), layout(), 2);
    assert!(matches!(result, Err(IndexError::Corruption(_))));
}

#[test]
fn test_decode_truncated_entries() {
    let block = block_with(2, &[(1, b"aaa"), (2, b"bbb")]);
    let bytes = block.encode();

    let result = Block::decode(&bytes[..bytes.len() - 1], layout(), 2);
    assert!(matches!(result, Err(IndexError::Corruption(_))));
}

#[test]
fn test_decode_duplicate_keys() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&9u64.to_le_bytes());
    bytes.extend_from_slice(b"aaa");
    bytes.extend_from_slice(&9u64.to_le_bytes());
    bytes.extend_from_slice(b"bbb");

    let result = Block::decode(&bytes, layout(), 2);
    assert!(matches!(result, Err(IndexError::Corruption(_))));
}
