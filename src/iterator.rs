//! Iterator Protocol
//!
//! Forward-only cursor shared by every sorted source in the core.
//!
//! ## Sources
//! - [`SkipListIterator`]: walks level 0 of one ordered map
//! - [`BlockIterator`]: positional cursor over an encoded block
//! - [`MergeIterator`]: heap fan-in over all in-memory tables
//!
//! The set is closed, so [`EntryIterator`] wraps the three kinds in one enum.
//! Equality only holds between iterators of the same kind.

use crate::error::Result;
use crate::memtable::{MergeIterator, SkipListIterator};
use crate::storage::BlockIterator;

/// Decoded `(key, value)` pair
pub type KvPair = (Vec<u8>, Vec<u8>);

/// `prefix + 0xFF`, the upper fencepost of a prefix range
///
/// Keys sort as raw bytes, so every key starting with `prefix` (other than
/// ones continuing with 0xFF) falls in `[prefix, prefix + 0xFF)`.
pub fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut upper = Vec::with_capacity(prefix.len() + 1);
    upper.extend_from_slice(prefix);
    upper.push(0xFF);
    upper
}

/// Capability set shared by every sorted source
pub trait KvIterator {
    /// Positioned at an entry
    fn valid(&self) -> bool;

    /// Move to the next entry (no-op once exhausted)
    fn advance(&mut self);

    /// Exhausted or never positioned
    fn is_end(&self) -> bool;

    /// The `(key, value)` at the current position
    fn entry(&self) -> Result<KvPair>;

    /// Version stamp of the current entry, 0 when not positioned
    fn version(&self) -> u64;

    /// Drain every remaining entry in order
    fn collect_remaining(&mut self) -> Result<Vec<KvPair>>
    where
        Self: Sized,
    {
        let mut entries = Vec::new();
        while self.valid() {
            entries.push(self.entry()?);
            self.advance();
        }
        Ok(entries)
    }
}

/// One iterator of any kind
pub enum EntryIterator {
    OrderedMap(SkipListIterator),
    Block(BlockIterator),
    Merged(MergeIterator),
}

impl KvIterator for EntryIterator {
    fn valid(&self) -> bool {
        match self {
            EntryIterator::OrderedMap(it) => it.valid(),
            EntryIterator::Block(it) => it.valid(),
            EntryIterator::Merged(it) => it.valid(),
        }
    }

    fn advance(&mut self) {
        match self {
            EntryIterator::OrderedMap(it) => it.advance(),
            EntryIterator::Block(it) => it.advance(),
            EntryIterator::Merged(it) => it.advance(),
        }
    }

    fn is_end(&self) -> bool {
        match self {
            EntryIterator::OrderedMap(it) => it.is_end(),
            EntryIterator::Block(it) => it.is_end(),
            EntryIterator::Merged(it) => it.is_end(),
        }
    }

    fn entry(&self) -> Result<KvPair> {
        match self {
            EntryIterator::OrderedMap(it) => it.entry(),
            EntryIterator::Block(it) => it.entry(),
            EntryIterator::Merged(it) => it.entry(),
        }
    }

    fn version(&self) -> u64 {
        match self {
            EntryIterator::OrderedMap(it) => it.version(),
            EntryIterator::Block(it) => it.version(),
            EntryIterator::Merged(it) => it.version(),
        }
    }
}

impl PartialEq for EntryIterator {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EntryIterator::OrderedMap(a), EntryIterator::OrderedMap(b)) => a == b,
            (EntryIterator::Block(a), EntryIterator::Block(b)) => a == b,
            (EntryIterator::Merged(a), EntryIterator::Merged(b)) => a == b,
            // Different kinds never compare equal
            _ => false,
        }
    }
}

impl From<SkipListIterator> for EntryIterator {
    fn from(it: SkipListIterator) -> Self {
        EntryIterator::OrderedMap(it)
    }
}

impl From<BlockIterator> for EntryIterator {
    fn from(it: BlockIterator) -> Self {
        EntryIterator::Block(it)
    }
}

impl From<MergeIterator> for EntryIterator {
    fn from(it: MergeIterator) -> Self {
        EntryIterator::Merged(it)
    }
}
