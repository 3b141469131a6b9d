//! Skip list implementation
//!
//! Probabilistic ordered map backing every MemTable table.
//!
//! ## Layout
//! Nodes live in an arena (`Vec<Node>`) and link to each other by index.
//! Slot 0 is the sentinel head: empty key, version 0, one link per level.
//! Slots freed by `delete` are recycled by later inserts.
//!
//! ```text
//! level 2: head ─────────────────────► c ───────────► ∅
//! level 1: head ─────► a ────────────► c ───► d ────► ∅
//! level 0: head ─────► a ────► b ────► c ───► d ────► ∅
//! ```
//!
//! The list itself is not synchronized; `MemTable` wraps it in locks.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{Config, MAX_LEVEL};
use crate::error::{Result, StrataError};
use crate::iterator::{prefix_upper_bound, KvIterator, KvPair};

/// Arena slot of the sentinel head
const HEAD: usize = 0;

/// Default promotion probability
const DEFAULT_PROBABILITY: f64 = 0.25;

/// One element of the ordered map
#[derive(Debug, Clone)]
pub struct Node {
    key: Vec<u8>,
    value: Vec<u8>,
    version: u64,
    /// Next node per level this node participates in
    forward: Vec<Option<usize>>,
}

impl Node {
    fn new(key: Vec<u8>, value: Vec<u8>, version: u64, level: usize) -> Self {
        Self {
            key,
            value,
            version,
            forward: vec![None; level],
        }
    }

    /// Placeholder left in a recycled slot
    fn vacant() -> Self {
        Self::new(Vec::new(), Vec::new(), 0, 0)
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Empty value marks a deleted key
    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }
}

/// Ordered map with per-entry version stamps
///
/// Clone copies the whole arena; `MemTable` relies on it for copy-on-write
/// when an iterator still holds the current table.
#[derive(Clone)]
pub struct SkipList {
    nodes: Vec<Node>,
    /// Recyclable arena slots
    free: Vec<usize>,
    max_level: usize,
    /// Tallest level currently occupied (at least 1)
    level: usize,
    /// Sum of key + value lengths of live nodes
    size_bytes: usize,
    node_count: usize,
    probability: f64,
    rng: StdRng,
}

impl SkipList {
    /// Create an empty list with default parameters and an entropy-seeded RNG
    pub fn new() -> Self {
        Self::with_params(MAX_LEVEL, DEFAULT_PROBABILITY, None)
    }

    /// Create an empty list whose level layout is reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::with_params(MAX_LEVEL, DEFAULT_PROBABILITY, Some(seed))
    }

    /// Create an empty list from the skip list section of a config
    pub fn from_config(config: &Config) -> Self {
        Self::with_params(
            config.skiplist_max_level,
            config.skiplist_probability,
            config.rng_seed,
        )
    }

    /// Create an empty list with explicit parameters
    ///
    /// `max_level` is clamped to `1..=MAX_LEVEL`.
    pub fn with_params(max_level: usize, probability: f64, seed: Option<u64>) -> Self {
        let max_level = max_level.clamp(1, MAX_LEVEL);
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            nodes: vec![Node::new(Vec::new(), Vec::new(), 0, max_level)],
            free: Vec::new(),
            max_level,
            level: 1,
            size_bytes: 0,
            node_count: 0,
            probability,
            rng,
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert or update `key`
    ///
    /// Returns false when nothing changed: the stored value already equals
    /// `value`, or the stored version is newer than `version`. An existing
    /// node with an older or equal version is updated in place.
    pub fn insert(&mut self, key: &[u8], value: &[u8], version: u64) -> bool {
        let update = self.find_predecessors(key);

        if let Some(idx) = self.nodes[update[0]].forward[0] {
            let node = &mut self.nodes[idx];
            if node.key == key {
                if node.value == value {
                    return false;
                }
                if node.version > version {
                    tracing::trace!(
                        stored = node.version,
                        incoming = version,
                        "skip list write rejected, newer version present"
                    );
                    return false;
                }
                self.size_bytes = self.size_bytes - node.value.len() + value.len();
                node.value = value.to_vec();
                node.version = version;
                return true;
            }
        }

        let level = self.random_level();
        // update[] already points at the head for levels above the old height
        self.level = self.level.max(level);

        let mut node = Node::new(key.to_vec(), value.to_vec(), version, level);
        for (i, link) in node.forward.iter_mut().enumerate() {
            *link = self.nodes[update[i]].forward[i];
        }
        let idx = self.alloc(node);
        for (i, &pred) in update.iter().enumerate().take(level) {
            self.nodes[pred].forward[i] = Some(idx);
        }

        self.size_bytes += key.len() + value.len();
        self.node_count += 1;
        true
    }

    /// Unlink `key` from every level; false if absent
    pub fn delete(&mut self, key: &[u8]) -> bool {
        let update = self.find_predecessors(key);

        let target = match self.nodes[update[0]].forward[0] {
            Some(idx) if self.nodes[idx].key == key => idx,
            _ => return false,
        };

        for (i, &pred) in update.iter().enumerate().take(self.level) {
            // The target only exists up to its own height
            if self.nodes[pred].forward[i] != Some(target) {
                break;
            }
            self.nodes[pred].forward[i] = self.nodes[target].forward[i];
        }

        let removed = std::mem::replace(&mut self.nodes[target], Node::vacant());
        self.free.push(target);
        self.size_bytes -= removed.key.len() + removed.value.len();
        self.node_count -= 1;

        while self.level > 1 && self.nodes[HEAD].forward[self.level - 1].is_none() {
            self.level -= 1;
        }
        true
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Value stored for `key`, tombstones included
    ///
    /// With a nonzero `version` the entry must carry a version <= `version`.
    pub fn contains(&self, key: &[u8], version: u64) -> Option<&[u8]> {
        self.get(key, version).map(Node::value)
    }

    /// Node stored for `key`, filtered like [`SkipList::contains`]
    pub fn get(&self, key: &[u8], version: u64) -> Option<&Node> {
        // Always finish the descent; the level-0 successor is the only candidate
        let idx = self.lower_bound(key)?;
        let node = &self.nodes[idx];
        if node.key != key {
            return None;
        }
        if version != 0 && node.version > version {
            return None;
        }
        Some(node)
    }

    /// Every live entry in key order, tombstones included
    pub fn flush(&self) -> Vec<KvPair> {
        self.iter()
            .map(|node| (node.key.clone(), node.value.clone()))
            .collect()
    }

    /// Borrowing iterator over level 0
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            next: self.nodes[HEAD].forward[0],
        }
    }

    /// Nodes inside the prefix range `[prefix, prefix + 0xFF)`
    pub fn prefix_nodes<'a>(&'a self, prefix: &[u8]) -> impl Iterator<Item = &'a Node> + 'a {
        let upper = prefix_upper_bound(prefix);
        Iter {
            list: self,
            next: self.lower_bound(prefix),
        }
        .take_while(move |node| node.key < upper)
    }

    /// Byte footprint (key + value lengths of live nodes)
    pub fn size(&self) -> usize {
        self.size_bytes
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Tallest occupied level
    pub fn height(&self) -> usize {
        self.level
    }

    // =========================================================================
    // Positioned Iterators
    // =========================================================================

    /// Iterator at the smallest key
    pub fn begin(self: &Arc<Self>) -> SkipListIterator {
        SkipListIterator::at(Arc::clone(self), self.nodes[HEAD].forward[0])
    }

    /// Past-the-end iterator
    pub fn end(self: &Arc<Self>) -> SkipListIterator {
        SkipListIterator::at(Arc::clone(self), None)
    }

    pub fn seek_to_first(self: &Arc<Self>) -> SkipListIterator {
        self.begin()
    }

    /// Iterator at the largest key (end if empty)
    pub fn seek_to_last(self: &Arc<Self>) -> SkipListIterator {
        let mut current = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[current].forward[i] {
                current = next;
            }
        }
        let last = (current != HEAD).then_some(current);
        SkipListIterator::at(Arc::clone(self), last)
    }

    /// Iterator at the visible entry for `key`, or end
    pub fn find(self: &Arc<Self>, key: &[u8], version: u64) -> SkipListIterator {
        let found = self.get(key, version).and_then(|_| self.lower_bound(key));
        SkipListIterator::at(Arc::clone(self), found)
    }

    /// First key >= `prefix`
    pub fn prefix_search_begin(self: &Arc<Self>, prefix: &[u8]) -> SkipListIterator {
        SkipListIterator::at(Arc::clone(self), self.lower_bound(prefix))
    }

    /// First key >= `prefix + 0xFF`; exclusive end of the prefix range
    pub fn prefix_search_end(self: &Arc<Self>, prefix: &[u8]) -> SkipListIterator {
        let upper = prefix_upper_bound(prefix);
        SkipListIterator::at(Arc::clone(self), self.lower_bound(&upper))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Last node before `key` on every occupied level (head above the height)
    fn find_predecessors(&self, key: &[u8]) -> [usize; MAX_LEVEL] {
        let mut update = [HEAD; MAX_LEVEL];
        let mut current = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[current].forward[i] {
                if self.nodes[next].key.as_slice() < key {
                    current = next;
                } else {
                    break;
                }
            }
            update[i] = current;
        }
        update
    }

    /// Slot of the first node with key >= `key`
    fn lower_bound(&self, key: &[u8]) -> Option<usize> {
        let update = self.find_predecessors(key);
        self.nodes[update[0]].forward[0]
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < self.max_level && self.rng.gen::<f64>() < self.probability {
            level += 1;
        }
        level
    }

    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SkipList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkipList")
            .field("node_count", &self.node_count)
            .field("size_bytes", &self.size_bytes)
            .field("level", &self.level)
            .field("max_level", &self.max_level)
            .finish()
    }
}

/// Borrowing iterator over a skip list's level 0
pub struct Iter<'a> {
    list: &'a SkipList,
    next: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = &self.list.nodes[self.next?];
        self.next = node.forward[0];
        Some(node)
    }
}

// =============================================================================
// SkipListIterator
// =============================================================================

/// Owning cursor over one skip list
///
/// Holds an `Arc` of the list, so the list it walks cannot change under it.
/// A default iterator has no list and is never valid.
#[derive(Default)]
pub struct SkipListIterator {
    list: Option<Arc<SkipList>>,
    current: Option<usize>,
}

impl SkipListIterator {
    fn at(list: Arc<SkipList>, current: Option<usize>) -> Self {
        Self {
            list: Some(list),
            current,
        }
    }

    fn node(&self) -> Option<&Node> {
        let list = self.list.as_ref()?;
        Some(&list.nodes[self.current?])
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.node().map(Node::key)
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.node().map(Node::value)
    }
}

impl KvIterator for SkipListIterator {
    fn valid(&self) -> bool {
        self.node().is_some()
    }

    fn advance(&mut self) {
        if let Some(next) = self.node().map(|node| node.forward[0]) {
            self.current = next;
        }
    }

    fn is_end(&self) -> bool {
        !self.valid()
    }

    fn entry(&self) -> Result<KvPair> {
        if self.list.is_none() {
            return Err(StrataError::InvalidState(
                "skip list iterator has no backing list".to_string(),
            ));
        }
        self.node()
            .map(|node| (node.key.clone(), node.value.clone()))
            .ok_or_else(|| {
                StrataError::OutOfRange("skip list iterator is past the end".to_string())
            })
    }

    fn version(&self) -> u64 {
        self.node().map_or(0, Node::version)
    }
}

impl PartialEq for SkipListIterator {
    fn eq(&self, other: &Self) -> bool {
        let same_list = match (&self.list, &other.list) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_list && self.current == other.current
    }
}
