//! Block index entries
//!
//! One `BlockMeta` per data block records its key range and where it starts
//! in the file. The whole list is serialized as a single checksummed run.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, StrataError};

use super::Block;

/// Count field
const COUNT_SIZE: usize = 8;
const CHECKSUM_SIZE: usize = 4;
/// Offset + two key length fields
const MIN_ENTRY_SIZE: usize = 8 + 2 + 2;

/// Key range and file offset of one block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockMeta {
    pub first_key: Vec<u8>,
    pub last_key: Vec<u8>,
    pub offset: usize,
}

impl BlockMeta {
    pub fn new(first_key: impl Into<Vec<u8>>, last_key: impl Into<Vec<u8>>, offset: usize) -> Self {
        Self {
            first_key: first_key.into(),
            last_key: last_key.into(),
            offset,
        }
    }

    /// Index entry for `block` written at `offset`
    pub fn from_block(block: &Block, offset: usize) -> Self {
        let (first_key, last_key) = block.get_first_and_last_key();
        Self {
            first_key,
            last_key,
            offset,
        }
    }

    /// Serialize the index: count, entries, CRC32 of the entries
    ///
    /// Fails with `OutOfRange` if a key is longer than `u16::MAX`.
    pub fn encode_meta(metas: &[BlockMeta]) -> Result<Bytes> {
        let entries_len: usize = metas
            .iter()
            .map(|meta| MIN_ENTRY_SIZE + meta.first_key.len() + meta.last_key.len())
            .sum();
        let mut buf = BytesMut::with_capacity(COUNT_SIZE + entries_len + CHECKSUM_SIZE);

        buf.put_u64_le(metas.len() as u64);
        for meta in metas {
            buf.put_u64_le(meta.offset as u64);
            put_key(&mut buf, &meta.first_key)?;
            put_key(&mut buf, &meta.last_key)?;
        }

        let crc = crc32fast::hash(&buf[COUNT_SIZE..]);
        buf.put_u32_le(crc);
        Ok(buf.freeze())
    }

    /// Parse an index produced by [`BlockMeta::encode_meta`]
    pub fn decode_meta(encoded: &[u8]) -> Result<Vec<BlockMeta>> {
        if encoded.len() < COUNT_SIZE + CHECKSUM_SIZE {
            return Err(StrataError::Corruption(format!(
                "block index of {} bytes is too short",
                encoded.len()
            )));
        }

        let mut header = &encoded[..COUNT_SIZE];
        let count = header.get_u64_le();
        let entries = &encoded[COUNT_SIZE..encoded.len() - CHECKSUM_SIZE];
        let mut tail = &encoded[encoded.len() - CHECKSUM_SIZE..];
        let stored = tail.get_u32_le();

        let computed = crc32fast::hash(entries);
        if stored != computed {
            tracing::warn!(stored, computed, "block index checksum mismatch");
            return Err(StrataError::Corruption(format!(
                "block index checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored, computed
            )));
        }

        if count > (entries.len() / MIN_ENTRY_SIZE) as u64 {
            return Err(StrataError::Corruption(format!(
                "block index declares {} entries in {} bytes",
                count,
                entries.len()
            )));
        }

        let mut buf = entries;
        let mut metas = Vec::with_capacity(count as usize);
        for i in 0..count {
            let truncated =
                || StrataError::Corruption(format!("block index entry {} is truncated", i));
            if buf.remaining() < 8 {
                return Err(truncated());
            }
            let offset = buf.get_u64_le() as usize;
            let first_key = take_key(&mut buf).ok_or_else(truncated)?;
            let last_key = take_key(&mut buf).ok_or_else(truncated)?;
            metas.push(BlockMeta {
                first_key,
                last_key,
                offset,
            });
        }

        if buf.has_remaining() {
            return Err(StrataError::Corruption(format!(
                "{} trailing bytes after block index entries",
                buf.remaining()
            )));
        }
        Ok(metas)
    }

    /// Block that may hold `key`: the first whose last key is >= `key`,
    /// provided its first key is <= `key`
    pub fn locate(metas: &[BlockMeta], key: &[u8]) -> Option<usize> {
        let idx = metas.partition_point(|meta| meta.last_key.as_slice() < key);
        metas
            .get(idx)
            .filter(|meta| meta.first_key.as_slice() <= key)
            .map(|_| idx)
    }
}

fn put_key(buf: &mut BytesMut, key: &[u8]) -> Result<()> {
    let len = u16::try_from(key.len()).map_err(|_| {
        StrataError::OutOfRange(format!("index key of {} bytes exceeds u16", key.len()))
    })?;
    buf.put_u16_le(len);
    buf.put_slice(key);
    Ok(())
}

fn take_key(buf: &mut &[u8]) -> Option<Vec<u8>> {
    if buf.remaining() < 2 {
        return None;
    }
    let len = buf.get_u16_le() as usize;
    if buf.remaining() < len {
        return None;
    }
    let key = buf[..len].to_vec();
    buf.advance(len);
    Some(key)
}
