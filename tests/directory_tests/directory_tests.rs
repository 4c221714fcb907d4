//! Tests for Directory
//!
//! These tests verify:
//! - Routing by low-order key bits
//! - Split bookkeeping and slot reassignment
//! - The routing invariant after arbitrary split sequences
//! - Rebuilding from persisted routes

use splitkv::directory::{Directory, Route};
use splitkv::IndexError;

// =============================================================================
// Routing Tests
// =============================================================================

#[test]
fn test_new_directory_routes_everything_to_block_zero() {
    let directory = Directory::new(16);

    assert_eq!(directory.table_size(), 16);
    assert_eq!(directory.global_depth(), 4);
    assert_eq!(directory.block_count(), 1);
    for key in [0u64, 1, 15, 16, 12345, u64::MAX] {
        assert_eq!(directory.resolve(key), 0);
    }
    assert_eq!(directory.local_depth_of(0), 0);
    assert_eq!(directory.slot_count(0), 16);
    directory.check_invariants().unwrap();
}

#[test]
fn test_slot_of_uses_low_bits() {
    let directory = Directory::new(16);

    assert_eq!(directory.slot_of(5), 5);
    assert_eq!(directory.slot_of(16), 0);
    assert_eq!(directory.slot_of(0x1234_5678_9ABC_DEF3), 3);
}

#[test]
fn test_single_slot_directory() {
    let directory = Directory::new(1);

    assert_eq!(directory.global_depth(), 0);
    assert_eq!(directory.resolve(42), 0);
    directory.check_invariants().unwrap();
}

// =============================================================================
// Split Tests
// =============================================================================

#[test]
fn test_commit_split_reassigns_odd_slots() {
    let mut directory = Directory::new(8);

    let new = directory.commit_split(0);

    assert_eq!(new, 1);
    assert_eq!(directory.route_of(0), Route { depth: 1, prefix: 0 });
    assert_eq!(directory.route_of(1), Route { depth: 1, prefix: 1 });
    for key in 0..8u64 {
        let expected = (key & 1) as usize;
        assert_eq!(directory.resolve(key), expected);
    }
    directory.check_invariants().unwrap();
}

#[test]
fn test_cascading_split_bookkeeping() {
    // keys 1 and 3 only differ at bit 1
    let mut directory = Directory::new(16);

    let first = directory.commit_split(0);
    assert_eq!(directory.resolve(1), first);
    assert_eq!(directory.resolve(3), first);

    let second = directory.commit_split(first);
    assert_eq!(directory.resolve(1), first);
    assert_eq!(directory.resolve(3), second);
    assert_eq!(directory.block_count(), 3);
    assert_eq!(directory.local_depth_of(0), 1);
    assert_eq!(directory.local_depth_of(first), 2);
    assert_eq!(directory.local_depth_of(second), 2);
    assert_eq!(directory.slot_count(0), 8);
    assert_eq!(directory.slot_count(first), 4);
    assert_eq!(directory.slot_count(second), 4);
    directory.check_invariants().unwrap();
}

#[test]
fn test_reassign_only_touches_matching_slots() {
    let mut directory = Directory::new(8);
    directory.commit_split(0);

    // Move bit-2 slots of block 0 by hand
    directory.reassign(0, 7, 2);

    assert_eq!(directory.resolve(0), 0);
    assert_eq!(directory.resolve(2), 0);
    assert_eq!(directory.resolve(4), 7);
    assert_eq!(directory.resolve(6), 7);
    assert_eq!(directory.resolve(5), 1);
}

#[test]
fn test_split_until_every_slot_has_own_block() {
    let mut directory = Directory::new(16);

    // Split the block of every key until all blocks reach global depth
    for key in 0..16u64 {
        while directory.local_depth_of(directory.resolve(key)) < directory.global_depth() {
            directory.commit_split(directory.resolve(key));
        }
    }

    assert_eq!(directory.block_count(), 16);
    for block in 0..16 {
        assert_eq!(directory.slot_count(block), 1);
    }
    directory.check_invariants().unwrap();
}

#[test]
fn test_route_children() {
    let route = Route { depth: 2, prefix: 0b01 };

    let (low, high) = route.children();

    assert_eq!(low, Route { depth: 3, prefix: 0b001 });
    assert_eq!(high, Route { depth: 3, prefix: 0b101 });
    assert!(high.matches(0b1101));
    assert!(!high.matches(0b1001));
}

// =============================================================================
// Rebuild Tests
// =============================================================================

#[test]
fn test_rebuild_matches_original() {
    let mut original = Directory::new(16);
    let a = original.commit_split(0);
    original.commit_split(a);
    original.commit_split(0);

    let (rebuilt, normalized) = Directory::rebuild(16, original.routes()).unwrap();

    assert!(normalized.is_empty());
    for key in 0..16u64 {
        assert_eq!(rebuilt.resolve(key), original.resolve(key));
    }
    assert_eq!(rebuilt.routes(), original.routes());
}

#[test]
fn test_rebuild_deeper_route_overrides_stale_parent() {
    // Parent still at depth 0, child at depth 1 already persisted
    let routes = [Route { depth: 0, prefix: 0 }, Route { depth: 1, prefix: 1 }];

    let (rebuilt, normalized) = Directory::rebuild(8, &routes).unwrap();

    assert_eq!(normalized, vec![0]);
    assert_eq!(rebuilt.route_of(0), Route { depth: 1, prefix: 0 });
    assert_eq!(rebuilt.resolve(3), 1);
    assert_eq!(rebuilt.resolve(2), 0);
    rebuilt.check_invariants().unwrap();
}

#[test]
fn test_rebuild_uncovered_slot_is_corruption() {
    let routes = [Route { depth: 1, prefix: 0 }];

    let result = Directory::rebuild(8, &routes);
    assert!(matches!(result, Err(IndexError::Corruption(_))));
}

#[test]
fn test_rebuild_route_deeper_than_table_is_corruption() {
    let routes = [Route { depth: 0, prefix: 0 }, Route { depth: 4, prefix: 1 }];

    let result = Directory::rebuild(8, &routes);
    assert!(matches!(result, Err(IndexError::Corruption(_))));
}

#[test]
fn test_rebuild_fully_shadowed_block_is_corruption() {
    let routes = [
        Route { depth: 1, prefix: 0 },
        Route { depth: 1, prefix: 1 },
        Route { depth: 1, prefix: 1 },
    ];

    let result = Directory::rebuild(4, &routes);
    assert!(matches!(result, Err(IndexError::Corruption(_))));
}
