//! File access abstraction
//!
//! Blocks and the index are read through [`FileObject`] so the core does
//! not depend on a particular I/O backend. [`MemFile`] keeps the bytes in
//! memory.

use std::sync::Arc;

use crate::error::{Result, StrataError};

use super::{Block, BlockMeta};

/// Random-access byte store
pub trait FileObject: Send + Sync {
    /// Read exactly `length` bytes starting at `offset`
    fn read(&self, offset: usize, length: usize) -> Result<Vec<u8>>;

    /// Overwrite at `offset`, growing the file if needed; false when
    /// `offset` is past the end
    fn write(&mut self, offset: usize, buf: &[u8]) -> bool;

    fn append(&mut self, buf: &[u8]) -> bool;

    /// Make previous writes durable
    fn sync(&mut self) -> bool;

    fn size(&self) -> usize;
}

/// In-memory [`FileObject`]
#[derive(Debug, Clone, Default)]
pub struct MemFile {
    data: Vec<u8>,
    /// Length at the last `sync`
    synced: usize,
}

impl MemFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let synced = data.len();
        Self { data, synced }
    }

    pub fn synced_len(&self) -> usize {
        self.synced
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl FileObject for MemFile {
    fn read(&self, offset: usize, length: usize) -> Result<Vec<u8>> {
        offset
            .checked_add(length)
            .and_then(|end| self.data.get(offset..end))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                StrataError::OutOfRange(format!(
                    "read of {} bytes at {} from a {}-byte file",
                    length,
                    offset,
                    self.data.len()
                ))
            })
    }

    fn write(&mut self, offset: usize, buf: &[u8]) -> bool {
        if offset > self.data.len() {
            return false;
        }
        let end = offset + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(buf);
        true
    }

    fn append(&mut self, buf: &[u8]) -> bool {
        self.data.extend_from_slice(buf);
        true
    }

    fn sync(&mut self) -> bool {
        self.synced = self.data.len();
        true
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}

/// Load and decode block `idx`
///
/// A block spans from its own offset to the next block's offset, or to
/// `data_end` for the last one.
pub fn read_block<F: FileObject + ?Sized>(
    file: &F,
    metas: &[BlockMeta],
    idx: usize,
    data_end: usize,
    with_checksum: bool,
) -> Result<Arc<Block>> {
    let meta = metas.get(idx).ok_or_else(|| {
        StrataError::OutOfRange(format!("block {} of an index with {} blocks", idx, metas.len()))
    })?;
    let end = metas.get(idx + 1).map_or(data_end, |next| next.offset);
    if end < meta.offset {
        return Err(StrataError::Corruption(format!(
            "block {} ends at {} before it starts at {}",
            idx, end, meta.offset
        )));
    }

    let bytes = file.read(meta.offset, end - meta.offset)?;
    tracing::trace!(block = idx, offset = meta.offset, len = bytes.len(), "read block");
    Block::decode(&bytes, with_checksum)
}
