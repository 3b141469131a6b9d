//! Merge iterator over in-memory tables.
//!
//! Every candidate `(key, value, version)` from every source sits in one
//! min-heap. Consumers see at most one entry per distinct key: the entry
//! that sorts first for that key, provided it is visible under the horizon
//! and is not a tombstone.
//!
//! Heap order: key ascending, version descending (newest first), then
//! source level and position ascending so equal keys and versions resolve
//! deterministically. Level 0 is the current table, frozen tables follow
//! newest-first.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::{Result, StrataError};
use crate::iterator::{KvIterator, KvPair};

use super::SkipListIterator;

/// One candidate entry tagged with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub version: u64,
    /// Source rank, lower is more recent
    pub level: usize,
    /// Position within the source
    pub index: usize,
}

impl SearchItem {
    pub fn new(key: Vec<u8>, value: Vec<u8>, version: u64, level: usize, index: usize) -> Self {
        Self {
            key,
            value,
            version,
            level,
            index,
        }
    }
}

impl PartialOrd for SearchItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| other.version.cmp(&self.version))
            .then_with(|| self.level.cmp(&other.level))
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Deduplicating, tombstone-eliding fan-in over tagged candidates
pub struct MergeIterator {
    /// BinaryHeap is a max-heap; Reverse turns it into a min-heap
    heap: BinaryHeap<Reverse<SearchItem>>,
    /// 0 sees everything
    horizon: u64,
}

impl MergeIterator {
    /// Build from collected candidates, positioned at the first visible key
    pub fn new(items: Vec<SearchItem>, horizon: u64) -> Self {
        let mut iter = Self {
            heap: items.into_iter().map(Reverse).collect(),
            horizon,
        };
        iter.settle();
        iter
    }

    /// Build from the remaining entries of a single skip list cursor
    pub fn from_ordered(mut source: SkipListIterator, horizon: u64) -> Self {
        let mut items = Vec::new();
        while let Ok((key, value)) = source.entry() {
            items.push(SearchItem::new(key, value, source.version(), 0, items.len()));
            source.advance();
        }
        Self::new(items, horizon)
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.top().map(|item| item.key.as_slice())
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.top().map(|item| item.value.as_slice())
    }

    fn top(&self) -> Option<&SearchItem> {
        self.heap.peek().map(|Reverse(item)| item)
    }

    /// Drop every queued entry for `key`
    fn pop_key(&mut self, key: &[u8]) {
        while self.top().is_some_and(|item| item.key == key) {
            self.heap.pop();
        }
    }

    /// Pop until the top is visible and live, or the heap is empty
    fn settle(&mut self) {
        loop {
            let (invisible, tombstone) = match self.top() {
                None => return,
                Some(top) => (
                    self.horizon != 0 && top.version > self.horizon,
                    top.value.is_empty().then(|| top.key.clone()),
                ),
            };

            if invisible {
                self.heap.pop();
            } else if let Some(key) = tombstone {
                self.pop_key(&key);
            } else {
                return;
            }
        }
    }
}

impl KvIterator for MergeIterator {
    fn valid(&self) -> bool {
        !self.heap.is_empty()
    }

    fn advance(&mut self) {
        if let Some(key) = self.top().map(|item| item.key.clone()) {
            self.pop_key(&key);
            self.settle();
        }
    }

    fn is_end(&self) -> bool {
        self.heap.is_empty()
    }

    fn entry(&self) -> Result<KvPair> {
        self.top()
            .map(|item| (item.key.clone(), item.value.clone()))
            .ok_or_else(|| StrataError::OutOfRange("merge iterator is exhausted".to_string()))
    }

    fn version(&self) -> u64 {
        self.top().map_or(0, |item| item.version)
    }
}

impl PartialEq for MergeIterator {
    fn eq(&self, other: &Self) -> bool {
        match (self.top(), other.top()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.key == b.key && a.value == b.value && a.version == b.version,
            _ => false,
        }
    }
}
