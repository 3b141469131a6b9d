//! Positional cursor over a decoded block

use std::cell::OnceCell;
use std::sync::Arc;

use crate::error::{Result, StrataError};
use crate::iterator::{KvIterator, KvPair};

use super::Block;

/// Cursor over one block, hiding entries newer than its horizon
///
/// The decoded pair is cached on first access and dropped on every move.
#[derive(Debug, Clone, Default)]
pub struct BlockIterator {
    block: Option<Arc<Block>>,
    index: usize,
    /// 0 sees every entry
    horizon: u64,
    cached: OnceCell<KvPair>,
}

impl BlockIterator {
    /// Cursor at `index`, moved forward past entries newer than `horizon`
    pub fn new(block: Arc<Block>, index: usize, horizon: u64) -> Self {
        let mut iter = Self::bound(block, index, horizon);
        iter.skip_invisible();
        iter
    }

    /// Cursor pinned at `index` with no skipping, used for range ends
    pub(crate) fn bound(block: Arc<Block>, index: usize, horizon: u64) -> Self {
        Self {
            block: Some(block),
            index,
            horizon,
            cached: OnceCell::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn horizon(&self) -> u64 {
        self.horizon
    }

    /// Borrow the current pair, decoding it once
    pub fn current(&self) -> Result<&KvPair> {
        if let Some(pair) = self.cached.get() {
            return Ok(pair);
        }

        let block = self
            .block
            .as_ref()
            .ok_or_else(|| StrataError::InvalidState("block iterator has no block".to_string()))?;
        let entry = block.entry(self.index).ok_or_else(|| {
            StrataError::OutOfRange(format!(
                "block iterator at {} of {} entries",
                self.index,
                block.len()
            ))
        })?;

        Ok(self
            .cached
            .get_or_init(|| (entry.key.to_vec(), entry.value.to_vec())))
    }

    fn skip_invisible(&mut self) {
        if self.horizon == 0 {
            return;
        }
        let Some(block) = &self.block else {
            return;
        };
        while block
            .entry(self.index)
            .is_some_and(|entry| entry.version > self.horizon)
        {
            self.index += 1;
        }
    }
}

impl KvIterator for BlockIterator {
    fn valid(&self) -> bool {
        self.block
            .as_ref()
            .is_some_and(|block| self.index < block.len())
    }

    fn advance(&mut self) {
        if !self.valid() {
            return;
        }
        self.index += 1;
        self.cached = OnceCell::new();
        self.skip_invisible();
    }

    fn is_end(&self) -> bool {
        !self.valid()
    }

    fn entry(&self) -> Result<KvPair> {
        self.current().cloned()
    }

    fn version(&self) -> u64 {
        self.block
            .as_ref()
            .and_then(|block| block.entry(self.index))
            .map_or(0, |entry| entry.version)
    }
}

impl PartialEq for BlockIterator {
    fn eq(&self, other: &Self) -> bool {
        match (&self.block, &other.block) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                Arc::ptr_eq(a, b) && self.index == other.index && self.horizon == other.horizon
            }
            _ => false,
        }
    }
}
