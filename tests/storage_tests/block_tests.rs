//! Block Tests
//!
//! Tests verify:
//! - Capacity accounting and the first-entry rule
//! - Binary search with and without a version filter
//! - Encode/decode round trips, with and without checksum
//! - Corruption detection
//! - Prefix ranges

use std::sync::Arc;

use stratakv::{Block, Config, KvIterator, StrataError};

/// Block holding key1..key10 in insertion order (not byte order)
fn ten_key_block() -> Arc<Block> {
    let mut block = Block::new(4096);
    for i in 1..=10 {
        let key = format!("key{}", i);
        let value = format!("value{}", i);
        assert!(block.add_entry(key.as_bytes(), value.as_bytes(), i));
    }
    Arc::new(block)
}

fn sorted_block(with_checksum: bool) -> Block {
    let mut block = if with_checksum {
        Block::with_checksum(4096)
    } else {
        Block::new(4096)
    };
    for i in 0..50 {
        let key = format!("k{:03}", i);
        let value = format!("v{}", i);
        assert!(block.add_entry(key.as_bytes(), value.as_bytes(), i as u64));
    }
    block
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_new_block_is_empty() {
    let block = Block::new(128);
    assert!(block.is_empty());
    assert_eq!(block.len(), 0);
    // Only the count field
    assert_eq!(block.current_size(), 2);
    assert_eq!(block.get_first_and_last_key(), (Vec::new(), Vec::new()));
}

#[test]
fn test_current_size_accounting() {
    let mut block = Block::new(128);
    block.add_entry(b"abc", b"de", 1);

    // 2 + 3 + 2 + 2 + 8 data, 2 offset, 2 count
    assert_eq!(block.current_size(), 21);
    assert_eq!(block.encode().len(), 21);
}

#[test]
fn test_first_entry_always_admitted() {
    let mut block = Block::new(8);
    assert!(block.add_entry(b"a-rather-long-key", b"and-a-long-value", 1));
    assert!(!block.add_entry(b"b", b"c", 1));
    assert_eq!(block.len(), 1);
}

#[test]
fn test_block_fills_to_exact_capacity() {
    // Each entry "kN"/"v" costs 2+2+2+1+8 = 15 data bytes and 2 offset bytes
    let mut block = Block::new(2 + 17 * 3);
    assert!(block.add_entry(b"k1", b"v", 1));
    assert!(block.add_entry(b"k2", b"v", 1));
    assert!(block.add_entry(b"k3", b"v", 1));
    assert_eq!(block.current_size(), block.capacity());
    assert!(!block.add_entry(b"k4", b"v", 1));
}

#[test]
fn test_checksum_trailer_counts_against_capacity() {
    let mut plain = Block::new(2 + 17 * 2);
    let mut summed = Block::with_checksum(2 + 17 * 2);
    for block in [&mut plain, &mut summed] {
        assert!(block.add_entry(b"k1", b"v", 1));
    }

    assert!(plain.add_entry(b"k2", b"v", 1));
    assert!(!summed.add_entry(b"k2", b"v", 1));
}

#[test]
fn test_oversized_key_refused() {
    let mut block = Block::new(usize::MAX);
    let key = vec![b'x'; u16::MAX as usize + 1];
    assert!(!block.add_entry(&key, b"v", 1));
    assert!(block.is_empty());
}

#[test]
fn test_from_config() {
    let config = Config::builder().block_size(256).block_checksum(true).build();
    let mut block = Block::from_config(&config);
    block.add_entry(b"k", b"v", 1);

    assert_eq!(block.capacity(), 256);
    assert_eq!(block.encode_with_checksum().len(), block.current_size() + 4);
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_get_value_binary() {
    let block = sorted_block(false);
    assert_eq!(block.get_value_binary(b"k000"), Some(b"v0".to_vec()));
    assert_eq!(block.get_value_binary(b"k025"), Some(b"v25".to_vec()));
    assert_eq!(block.get_value_binary(b"k049"), Some(b"v49".to_vec()));
    assert_eq!(block.get_value_binary(b"k050"), None);
    assert_eq!(block.get_value_binary(b"a"), None);
}

#[test]
fn test_get_idx_binary_version_filter() {
    let block = sorted_block(false);
    assert_eq!(block.get_idx_binary(b"k020", 0), Some(20));
    assert_eq!(block.get_idx_binary(b"k020", 20), Some(20));
    assert_eq!(block.get_idx_binary(b"k020", 19), None);
}

#[test]
fn test_first_and_last_key() {
    let block = sorted_block(false);
    assert_eq!(
        block.get_first_and_last_key(),
        (b"k000".to_vec(), b"k049".to_vec())
    );
    assert_eq!(block.first_key(), b"k000".to_vec());
}

#[test]
fn test_offset_and_version_accessors() {
    let block = sorted_block(false);
    assert_eq!(block.offset(0).unwrap(), 0);
    // "k000"/"v0": 2 + 4 + 2 + 2 + 8
    assert_eq!(block.offset(1).unwrap(), 18);
    assert_eq!(block.version_at(7).unwrap(), 7);

    assert!(matches!(block.offset(50), Err(StrataError::OutOfRange(_))));
    assert!(matches!(block.version_at(50), Err(StrataError::OutOfRange(_))));
    assert!(matches!(Block::new(8).offset(0), Err(StrataError::OutOfRange(_))));
}

// =============================================================================
// Encode / Decode Tests
// =============================================================================

#[test]
fn test_round_trip_without_checksum() {
    let block = sorted_block(false);
    let decoded = Block::decode(&block.encode(), false).unwrap();

    assert_eq!(decoded.len(), block.len());
    assert_eq!(decoded.get_first_and_last_key(), block.get_first_and_last_key());
    for i in 0..50 {
        let key = format!("k{:03}", i);
        assert_eq!(
            decoded.get_value_binary(key.as_bytes()),
            block.get_value_binary(key.as_bytes())
        );
    }
}

#[test]
fn test_round_trip_with_checksum() {
    let block = sorted_block(true);
    let encoded = block.encode_with_checksum();
    let decoded = Block::decode(&encoded, true).unwrap();

    assert_eq!(decoded.get_value_binary(b"k031"), Some(b"v31".to_vec()));
    assert_eq!(decoded.encode_with_checksum(), encoded);
}

#[test]
fn test_empty_block_round_trip() {
    let decoded = Block::decode(&Block::new(64).encode_with_checksum(), true).unwrap();
    assert!(decoded.is_empty());
}

#[test]
fn test_any_flipped_byte_is_corruption() {
    let encoded = sorted_block(true).encode_with_checksum();

    for pos in 0..encoded.len() {
        let mut tampered = encoded.to_vec();
        tampered[pos] ^= 0x01;
        let result = Block::decode(&tampered, true);
        assert!(
            matches!(result, Err(StrataError::Corruption(_))),
            "flip at {} not detected",
            pos
        );
    }
}

#[test]
fn test_undersized_buffers_are_corruption() {
    assert!(matches!(Block::decode(&[], false), Err(StrataError::Corruption(_))));
    assert!(matches!(Block::decode(&[0], false), Err(StrataError::Corruption(_))));
    assert!(matches!(
        Block::decode(&[0, 0, 0], true),
        Err(StrataError::Corruption(_))
    ));
}

#[test]
fn test_declared_count_exceeding_buffer_is_corruption() {
    // Count of 100 entries with no offsets behind it
    let bytes = [100u8, 0];
    assert!(matches!(
        Block::decode(&bytes, false),
        Err(StrataError::Corruption(_))
    ));
}

#[test]
fn test_offset_past_data_is_corruption() {
    let mut encoded = sorted_block(false).encode().to_vec();
    // Point the first offset far beyond the data section
    let index_start = encoded.len() - 2 - 50 * 2;
    encoded[index_start] = 0xFF;
    encoded[index_start + 1] = 0xFF;

    assert!(matches!(
        Block::decode(&encoded, false),
        Err(StrataError::Corruption(_))
    ));
}

// =============================================================================
// Prefix Tests
// =============================================================================

#[test]
fn test_prefix_iterator_key3_to_key10() {
    let block = ten_key_block();
    let (mut begin, end) = block.get_prefix_iterator(b"key3", 0).unwrap();

    let mut keys = Vec::new();
    while begin != end {
        keys.push(String::from_utf8(begin.entry().unwrap().0).unwrap());
        begin.advance();
    }
    let expected: Vec<String> = (3..=10).map(|i| format!("key{}", i)).collect();
    assert_eq!(keys, expected);
}

#[test]
fn test_prefix_iterator_stops_at_sentinel() {
    let mut block = Block::new(4096);
    block.add_entry(b"ab", b"1", 1);
    block.add_entry(b"abc", b"2", 1);
    block.add_entry(b"ab\xFF", b"3", 1);
    block.add_entry(b"b", b"4", 1);
    let block = Arc::new(block);

    let (begin, end) = block.get_prefix_iterator(b"ab", 0).unwrap();
    assert_eq!(begin.index(), 0);
    assert_eq!(end.index(), 2);
}

#[test]
fn test_prefix_iterator_missing_prefix() {
    let block = ten_key_block();
    assert!(block.get_prefix_iterator(b"nope", 0).is_none());
}
