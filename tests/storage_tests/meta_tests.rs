//! Block Index and File Tests
//!
//! Tests verify:
//! - Index encode/decode and its byte layout
//! - Corruption detection in the index
//! - Locating the block for a key
//! - MemFile reads/writes and read_block

use stratakv::storage::{read_block, FileObject, MemFile};
use stratakv::{Block, BlockMeta, StrataError};

fn sample_metas() -> Vec<BlockMeta> {
    vec![
        BlockMeta::new("a", "f", 0),
        BlockMeta::new("g", "m", 4096),
        BlockMeta::new("n", "z", 8192),
    ]
}

// =============================================================================
// Index Encoding Tests
// =============================================================================

#[test]
fn test_encode_decode_meta() {
    let metas = sample_metas();
    let encoded = BlockMeta::encode_meta(&metas).unwrap();
    assert_eq!(BlockMeta::decode_meta(&encoded).unwrap(), metas);
}

#[test]
fn test_meta_layout() {
    let encoded = BlockMeta::encode_meta(&[BlockMeta::new("ab", "c", 7)]).unwrap();

    let mut expected = Vec::new();
    expected.extend_from_slice(&1u64.to_le_bytes());
    expected.extend_from_slice(&7u64.to_le_bytes());
    expected.extend_from_slice(&2u16.to_le_bytes());
    expected.extend_from_slice(b"ab");
    expected.extend_from_slice(&1u16.to_le_bytes());
    expected.extend_from_slice(b"c");
    let crc = crc32fast::hash(&expected[8..]);
    expected.extend_from_slice(&crc.to_le_bytes());

    assert_eq!(encoded.as_ref(), expected.as_slice());
}

#[test]
fn test_empty_meta_round_trip() {
    let encoded = BlockMeta::encode_meta(&[]).unwrap();
    assert_eq!(encoded.len(), 12);
    assert!(BlockMeta::decode_meta(&encoded).unwrap().is_empty());
}

#[test]
fn test_meta_checksum_mismatch() {
    let mut encoded = BlockMeta::encode_meta(&sample_metas()).unwrap().to_vec();
    encoded[10] ^= 0xFF;
    assert!(matches!(
        BlockMeta::decode_meta(&encoded),
        Err(StrataError::Corruption(_))
    ));
}

#[test]
fn test_meta_inflated_count() {
    let mut encoded = BlockMeta::encode_meta(&sample_metas()).unwrap().to_vec();
    // The count is outside the checksum, so only the entry walk catches it
    encoded[0] = 4;
    assert!(matches!(
        BlockMeta::decode_meta(&encoded),
        Err(StrataError::Corruption(_))
    ));
}

#[test]
fn test_meta_deflated_count() {
    let mut encoded = BlockMeta::encode_meta(&sample_metas()).unwrap().to_vec();
    encoded[0] = 2;
    assert!(matches!(
        BlockMeta::decode_meta(&encoded),
        Err(StrataError::Corruption(_))
    ));
}

#[test]
fn test_meta_too_short() {
    assert!(matches!(
        BlockMeta::decode_meta(&[0; 11]),
        Err(StrataError::Corruption(_))
    ));
}

#[test]
fn test_meta_key_too_long() {
    let long = vec![b'k'; u16::MAX as usize + 1];
    let metas = [BlockMeta::new(long, "z", 0)];
    assert!(matches!(
        BlockMeta::encode_meta(&metas),
        Err(StrataError::OutOfRange(_))
    ));
}

// =============================================================================
// Locate Tests
// =============================================================================

#[test]
fn test_locate() {
    let metas = sample_metas();
    assert_eq!(BlockMeta::locate(&metas, b"a"), Some(0));
    assert_eq!(BlockMeta::locate(&metas, b"c"), Some(0));
    assert_eq!(BlockMeta::locate(&metas, b"m"), Some(1));
    assert_eq!(BlockMeta::locate(&metas, b"p"), Some(2));
    assert_eq!(BlockMeta::locate(&metas, b"zz"), None);
    assert_eq!(BlockMeta::locate(&[], b"a"), None);
}

#[test]
fn test_locate_gap_between_blocks() {
    let metas = vec![BlockMeta::new("a", "c", 0), BlockMeta::new("x", "z", 100)];
    assert_eq!(BlockMeta::locate(&metas, b"m"), None);
}

#[test]
fn test_from_block() {
    let mut block = Block::new(256);
    block.add_entry(b"first", b"1", 1);
    block.add_entry(b"last", b"2", 1);

    let meta = BlockMeta::from_block(&block, 64);
    assert_eq!(meta, BlockMeta::new("first", "last", 64));
}

// =============================================================================
// File Tests
// =============================================================================

#[test]
fn test_mem_file_read_write() {
    let mut file = MemFile::new();
    assert!(file.append(b"hello"));
    assert!(file.write(5, b" world"));
    assert!(file.write(0, b"J"));

    assert_eq!(file.size(), 11);
    assert_eq!(file.read(0, 11).unwrap(), b"Jello world".to_vec());
    assert_eq!(file.read(6, 5).unwrap(), b"world".to_vec());
}

#[test]
fn test_mem_file_bounds() {
    let mut file = MemFile::from_bytes(b"abc".to_vec());
    assert!(matches!(file.read(2, 2), Err(StrataError::OutOfRange(_))));
    assert!(matches!(file.read(usize::MAX, 2), Err(StrataError::OutOfRange(_))));
    assert!(!file.write(4, b"x"));
    assert_eq!(file.read(3, 0).unwrap(), Vec::<u8>::new());
}

#[test]
fn test_mem_file_sync() {
    let mut file = MemFile::new();
    file.append(b"data");
    assert_eq!(file.synced_len(), 0);
    assert!(file.sync());
    assert_eq!(file.synced_len(), 4);
}

#[test]
fn test_read_block_from_file() {
    let mut file = MemFile::new();
    let mut metas = Vec::new();

    for chunk in 0..3 {
        let mut block = Block::with_checksum(512);
        for i in 0..5 {
            let key = format!("c{}-k{}", chunk, i);
            block.add_entry(key.as_bytes(), b"v", 1);
        }
        metas.push(BlockMeta::from_block(&block, file.size()));
        file.append(&block.encode_with_checksum());
    }
    let data_end = file.size();

    // The index follows the data blocks
    file.append(&BlockMeta::encode_meta(&metas).unwrap());

    let block = read_block(&file, &metas, 1, data_end, true).unwrap();
    assert_eq!(block.get_value_binary(b"c1-k3"), Some(b"v".to_vec()));
    assert_eq!(block.first_key(), b"c1-k0".to_vec());

    let idx = BlockMeta::locate(&metas, b"c2-k1").unwrap();
    let last = read_block(&file, &metas, idx, data_end, true).unwrap();
    assert_eq!(last.len(), 5);

    assert!(matches!(
        read_block(&file, &metas, 3, data_end, true),
        Err(StrataError::OutOfRange(_))
    ));
}

#[test]
fn test_read_block_detects_damage() {
    let mut block = Block::with_checksum(512);
    block.add_entry(b"k", b"v", 1);
    let mut bytes = block.encode_with_checksum().to_vec();
    bytes[0] ^= 0x40;

    let file = MemFile::from_bytes(bytes);
    let metas = vec![BlockMeta::from_block(&block, 0)];
    assert!(matches!(
        read_block(&file, &metas, 0, file.size(), true),
        Err(StrataError::Corruption(_))
    ));
}
