//! Data Block
//!
//! A block owns its entry bytes and a table of entry offsets. Entries are
//! appended in the order they arrive; lookups binary search that order, so
//! callers feed sorted keys.

mod iterator;

pub use iterator::BlockIterator;

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::iterator::prefix_upper_bound;

/// Size of an offset table slot and of the count field
const U16_SIZE: usize = 2;

/// Size of the CRC32 trailer
const CHECKSUM_SIZE: usize = 4;

/// Key length + value length + version
const ENTRY_OVERHEAD: usize = U16_SIZE + U16_SIZE + 8;

/// Borrowed view of one encoded entry
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryRef<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
    pub version: u64,
}

/// Size-bounded run of versioned entries
#[derive(Debug, Clone, Default)]
pub struct Block {
    data: Vec<u8>,
    offsets: Vec<u16>,
    /// Byte budget for the encoded block, trailer included
    capacity: usize,
    /// CRC32 bytes reserved at the end (0 or 4)
    trailer: usize,
}

impl Block {
    /// Create an empty block that encodes without a checksum
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            offsets: Vec::new(),
            capacity,
            trailer: 0,
        }
    }

    /// Create an empty block that reserves room for a CRC32 trailer
    pub fn with_checksum(capacity: usize) -> Self {
        Self {
            trailer: CHECKSUM_SIZE,
            ..Self::new(capacity)
        }
    }

    pub fn from_config(config: &Config) -> Self {
        if config.block_checksum {
            Self::with_checksum(config.block_size)
        } else {
            Self::new(config.block_size)
        }
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Append an entry; false when the block cannot take it
    ///
    /// The first entry is always admitted. Later ones must fit within
    /// `capacity` once encoded, trailer included. Keys or values longer
    /// than `u16::MAX`, or a data section past `u16::MAX` bytes, are refused.
    pub fn add_entry(&mut self, key: &[u8], value: &[u8], version: u64) -> bool {
        let limit = u16::MAX as usize;
        if key.len() > limit || value.len() > limit || self.data.len() > limit {
            tracing::warn!(
                key_len = key.len(),
                value_len = value.len(),
                data_len = self.data.len(),
                "entry does not fit the block encoding"
            );
            return false;
        }

        let entry_size = key.len() + value.len() + ENTRY_OVERHEAD;
        if !self.offsets.is_empty()
            && self.current_size() + entry_size + U16_SIZE + self.trailer > self.capacity
        {
            tracing::trace!(
                entries = self.offsets.len(),
                size = self.current_size(),
                capacity = self.capacity,
                "block full"
            );
            return false;
        }

        self.offsets.push(self.data.len() as u16);
        self.data.put_u16_le(key.len() as u16);
        self.data.put_slice(key);
        self.data.put_u16_le(value.len() as u16);
        self.data.put_slice(value);
        self.data.put_u64_le(version);
        true
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Serialize as data ++ offsets ++ count
    pub fn encode(&self) -> Bytes {
        self.encode_inner(false)
    }

    /// Serialize with a CRC32 of the encoded bytes appended
    pub fn encode_with_checksum(&self) -> Bytes {
        self.encode_inner(true)
    }

    fn encode_inner(&self, checksum: bool) -> Bytes {
        let trailer = if checksum { CHECKSUM_SIZE } else { 0 };
        let mut buf = BytesMut::with_capacity(self.current_size() + trailer);
        buf.put_slice(&self.data);
        for &offset in &self.offsets {
            buf.put_u16_le(offset);
        }
        buf.put_u16_le(self.offsets.len() as u16);

        if checksum {
            let crc = crc32fast::hash(&buf);
            buf.put_u32_le(crc);
        }
        buf.freeze()
    }

    /// Rebuild a block from its encoding
    ///
    /// Every size field and entry bound is checked; any inconsistency is
    /// reported as `Corruption` rather than trusted.
    pub fn decode(encoded: &[u8], with_checksum: bool) -> Result<Arc<Block>> {
        let trailer = if with_checksum { CHECKSUM_SIZE } else { 0 };
        if encoded.len() < U16_SIZE + trailer {
            return Err(StrataError::Corruption(format!(
                "block of {} bytes is smaller than its footer",
                encoded.len()
            )));
        }

        let body_len = encoded.len() - trailer;
        if with_checksum {
            let mut tail = &encoded[body_len..];
            let stored = tail.get_u32_le();
            let computed = crc32fast::hash(&encoded[..body_len]);
            if stored != computed {
                tracing::warn!(stored, computed, "block checksum mismatch");
                return Err(StrataError::Corruption(format!(
                    "block checksum mismatch: stored {:#010x}, computed {:#010x}",
                    stored, computed
                )));
            }
        }

        let mut count_field = &encoded[body_len - U16_SIZE..body_len];
        let count = count_field.get_u16_le() as usize;
        let index_len = count * U16_SIZE;
        if index_len + U16_SIZE > body_len {
            return Err(StrataError::Corruption(format!(
                "block declares {} entries but holds only {} bytes",
                count, body_len
            )));
        }

        let data_end = body_len - U16_SIZE - index_len;
        let mut index = &encoded[data_end..body_len - U16_SIZE];
        let offsets = (0..count).map(|_| index.get_u16_le()).collect();

        let block = Block {
            data: encoded[..data_end].to_vec(),
            offsets,
            capacity: encoded.len(),
            trailer,
        };
        for (i, &offset) in block.offsets.iter().enumerate() {
            if block.entry(i).is_none() {
                tracing::warn!(entry = i, offset, "block entry out of bounds");
                return Err(StrataError::Corruption(format!(
                    "entry {} at offset {} runs past the {}-byte data section",
                    i,
                    offset,
                    block.data.len()
                )));
            }
        }
        Ok(Arc::new(block))
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Position of `key`, if present and visible at `version`
    ///
    /// Exact-match binary search. A nonzero `version` hides an entry whose
    /// stamp is newer.
    pub fn get_idx_binary(&self, key: &[u8], version: u64) -> Option<usize> {
        let mut lo = 0;
        let mut hi = self.offsets.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.entry(mid)?;
            match entry.key.cmp(key) {
                std::cmp::Ordering::Equal => {
                    return (version == 0 || entry.version <= version).then_some(mid);
                }
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }

    /// Value stored for `key`, regardless of version
    pub fn get_value_binary(&self, key: &[u8]) -> Option<Vec<u8>> {
        let idx = self.get_idx_binary(key, 0)?;
        self.entry(idx).map(|entry| entry.value.to_vec())
    }

    /// Keys of the first and last entries; empty vectors for an empty block
    pub fn get_first_and_last_key(&self) -> (Vec<u8>, Vec<u8>) {
        let key_of = |idx: Option<usize>| {
            idx.and_then(|i| self.entry(i))
                .map(|entry| entry.key.to_vec())
                .unwrap_or_default()
        };
        (key_of(Some(0)), key_of(self.len().checked_sub(1)))
    }

    pub fn first_key(&self) -> Vec<u8> {
        self.get_first_and_last_key().0
    }

    /// `[begin, end)` iterators over entries starting with `prefix`
    ///
    /// `None` unless `prefix` itself is stored as a key. The end sits on an
    /// exact `prefix + 0xFF` entry when one exists, otherwise past the last
    /// entry.
    pub fn get_prefix_iterator(
        self: &Arc<Self>,
        prefix: &[u8],
        version: u64,
    ) -> Option<(BlockIterator, BlockIterator)> {
        let start = self.get_idx_binary(prefix, version)?;
        let end = self
            .get_idx_binary(&prefix_upper_bound(prefix), version)
            .unwrap_or(self.len());

        let end_iter = BlockIterator::bound(Arc::clone(self), end, version);
        let mut begin_iter = BlockIterator::new(Arc::clone(self), start, version);
        if begin_iter.index() > end {
            begin_iter = end_iter.clone();
        }
        Some((begin_iter, end_iter))
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Cursor on the first entry
    pub fn begin(self: &Arc<Self>) -> BlockIterator {
        BlockIterator::new(Arc::clone(self), 0, 0)
    }

    /// Cursor one past the last entry
    pub fn end(self: &Arc<Self>) -> BlockIterator {
        BlockIterator::bound(Arc::clone(self), self.len(), 0)
    }

    /// Cursor on `key` as seen at `version`, or the end cursor
    pub fn iter_at(self: &Arc<Self>, key: &[u8], version: u64) -> BlockIterator {
        match self.get_idx_binary(key, version) {
            Some(idx) => BlockIterator::new(Arc::clone(self), idx, version),
            None => BlockIterator::bound(Arc::clone(self), self.len(), version),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Encoded size without the trailer
    pub fn current_size(&self) -> usize {
        self.data.len() + self.offsets.len() * U16_SIZE + U16_SIZE
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Byte offset of entry `idx` within the data section
    pub fn offset(&self, idx: usize) -> Result<usize> {
        self.offsets
            .get(idx)
            .map(|&offset| offset as usize)
            .ok_or_else(|| self.out_of_range(idx))
    }

    /// Version stamp of entry `idx`
    pub fn version_at(&self, idx: usize) -> Result<u64> {
        self.entry(idx)
            .map(|entry| entry.version)
            .ok_or_else(|| self.out_of_range(idx))
    }

    fn out_of_range(&self, idx: usize) -> StrataError {
        StrataError::OutOfRange(format!(
            "entry {} of a block with {} entries",
            idx,
            self.len()
        ))
    }

    /// Parse entry `idx`; `None` past the end or when its bytes are short
    pub(crate) fn entry(&self, idx: usize) -> Option<EntryRef<'_>> {
        let offset = *self.offsets.get(idx)? as usize;
        let mut buf = self.data.get(offset..)?;

        if buf.len() < U16_SIZE {
            return None;
        }
        let key_len = buf.get_u16_le() as usize;
        if buf.len() < key_len + U16_SIZE {
            return None;
        }
        let (key, rest) = buf.split_at(key_len);
        buf = rest;

        let value_len = buf.get_u16_le() as usize;
        if buf.len() < value_len + 8 {
            return None;
        }
        let (value, rest) = buf.split_at(value_len);
        buf = rest;

        Some(EntryRef {
            key,
            value,
            version: buf.get_u64_le(),
        })
    }
}
