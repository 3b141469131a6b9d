//! MemTable implementation
//!
//! One current skip list plus a deque of frozen ones, each behind its own
//! parking_lot RwLock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::config::Config;
use crate::error::Result;

use super::{MergeIterator, Node, SearchItem, SkipList, SkipListIterator, TableStatus};

/// Frozen tables, newest at the front, with their combined footprint
#[derive(Default)]
struct FrozenTables {
    tables: VecDeque<Arc<SkipList>>,
    bytes: usize,
}

/// Exclusive hold on both locks
///
/// Only built from an already-held current-table guard, so the frozen lock
/// is always acquired second.
struct FreezeGuard<'a> {
    current: RwLockWriteGuard<'a, Arc<SkipList>>,
    frozen: RwLockWriteGuard<'a, FrozenTables>,
}

/// In-memory table for recent writes
///
/// ## Concurrency:
/// - `current`: RwLock; writers exclusive, readers shared
/// - `frozen`: RwLock over the frozen deque and its byte total
/// - Lock order is always `current` before `frozen`; `FreezeGuard` is the
///   only way to hold both exclusively
/// - All methods use `&self`
pub struct MemTable {
    config: Config,

    /// Read-write table (cur lock)
    current: RwLock<Arc<SkipList>>,

    /// Read-only tables, newest first (fix lock)
    frozen: RwLock<FrozenTables>,

    /// TableStatus as u8
    status: AtomicU8,

    /// Tables created so far, mixed into seeded RNGs
    generation: AtomicU64,
}

impl MemTable {
    /// Create a new empty MemTable with the default config
    pub fn new() -> Self {
        Self::build(Config::default())
    }

    /// Create a new empty MemTable after validating `config`
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: Config) -> Self {
        let first = Self::make_table(&config, 0);
        Self {
            config,
            current: RwLock::new(Arc::new(first)),
            frozen: RwLock::new(FrozenTables::default()),
            status: AtomicU8::new(TableStatus::Normal as u8),
            generation: AtomicU64::new(1),
        }
    }

    fn make_table(config: &Config, generation: u64) -> SkipList {
        let seed = config.rng_seed.map(|seed| seed.wrapping_add(generation));
        SkipList::with_params(config.skiplist_max_level, config.skiplist_probability, seed)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Put a key-value pair into the current table
    ///
    /// Freezes the current table afterwards if it outgrew the limit.
    pub fn put(&self, key: &[u8], value: &[u8], version: u64) {
        let mut current = self.current.write();
        Arc::make_mut(&mut *current).insert(key, value, version);
        self.mark_written();
        self.freeze_if_full(current);
    }

    /// Write a tombstone (empty value) for `key`
    pub fn remove(&self, key: &[u8], version: u64) {
        self.put(key, &[], version);
    }

    /// Put every pair under one lock hold; the freeze check runs once at the end
    pub fn put_batch<I, K, V>(&self, pairs: I, version: u64)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut current = self.current.write();
        let table = Arc::make_mut(&mut *current);
        for (key, value) in pairs {
            table.insert(key.as_ref(), value.as_ref(), version);
        }
        self.mark_written();
        self.freeze_if_full(current);
    }

    /// Tombstone every key under one lock hold
    pub fn remove_batch<I, K>(&self, keys: I, version: u64)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut current = self.current.write();
        let table = Arc::make_mut(&mut *current);
        for key in keys {
            table.insert(key.as_ref(), &[], version);
        }
        self.mark_written();
        self.freeze_if_full(current);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Latest value for `key`
    ///
    /// Checks the current table, then frozen tables newest to oldest. The
    /// first table holding the key decides; a tombstone there means `None`.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let current = self.current.read();
        if let Some(value) = current.contains(key, 0) {
            return live(value);
        }

        let frozen = self.frozen.read();
        let found = frozen
            .tables
            .iter()
            .find_map(|table| table.contains(key, 0))
            .and_then(live);
        found
    }

    /// `get` for every key
    ///
    /// Found keys are paired with the requesting `version`, missing ones
    /// with `(None, None)`.
    pub fn get_batch<K: AsRef<[u8]>>(
        &self,
        keys: &[K],
        version: u64,
    ) -> Vec<(Vec<u8>, Option<Vec<u8>>, Option<u64>)> {
        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                match self.get(key) {
                    Some(value) => (key.to_vec(), Some(value), Some(version)),
                    None => (key.to_vec(), None, None),
                }
            })
            .collect()
    }

    /// Version-filtered lookup in the current table only
    ///
    /// The returned iterator is invalid when nothing visible matches.
    pub fn cur_get(&self, key: &[u8], version: u64) -> SkipListIterator {
        let current = self.current.read();
        current.find(key, version)
    }

    /// Version-filtered lookup in frozen tables only, newest first
    pub fn fix_get(&self, key: &[u8], version: u64) -> SkipListIterator {
        let frozen = self.frozen.read();
        let found = frozen
            .tables
            .iter()
            .find(|table| table.get(key, version).is_some())
            .map(|table| table.find(key, version));
        found.unwrap_or_default()
    }

    /// Merged iterator over every key starting with `prefix`
    ///
    /// Entries newer than `version` (when nonzero) are left out; the rest
    /// are tagged with `version`, so the most recent table wins a tie.
    pub fn prefix_search(&self, prefix: &[u8], version: u64) -> MergeIterator {
        let items = self.gather(Some(prefix), version, Some(version));
        MergeIterator::new(items, version)
    }

    /// Merged iterator over every table, resolved by stored versions
    pub fn iter(&self, horizon: u64) -> MergeIterator {
        let items = self.gather(None, horizon, None);
        MergeIterator::new(items, horizon)
    }

    // =========================================================================
    // Freezing
    // =========================================================================

    /// Retire the current table to the front of the frozen deque
    pub fn frozen_cur_table(&self) {
        let mut guard = self.lock_all();
        self.freeze(&mut guard);
    }

    /// Freeze the current table, then evict frozen tables beyond the ceiling
    ///
    /// Returns evicted tables, oldest first, for the caller to persist.
    pub fn flush(&self) -> Vec<Arc<SkipList>> {
        let mut guard = self.lock_all();
        self.freeze(&mut guard);

        let mut evicted = Vec::new();
        while guard.frozen.tables.len() > self.config.max_frozen_tables {
            let Some(oldest) = guard.frozen.tables.pop_back() else {
                break;
            };
            guard.frozen.bytes -= oldest.size();
            evicted.push(oldest);
        }

        if !evicted.is_empty() {
            tracing::debug!(
                evicted = evicted.len(),
                remaining = guard.frozen.tables.len(),
                frozen_bytes = guard.frozen.bytes,
                "evicted oldest frozen tables"
            );
        }
        evicted
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Footprint of the current table
    pub fn get_cur_size(&self) -> usize {
        self.current.read().size()
    }

    /// Combined footprint of frozen tables
    pub fn get_fixed_size(&self) -> usize {
        self.frozen.read().bytes
    }

    pub fn get_total_size(&self) -> usize {
        let current = self.current.read();
        let frozen = self.frozen.read();
        current.size() + frozen.bytes
    }

    /// Number of frozen tables
    pub fn frozen_count(&self) -> usize {
        self.frozen.read().tables.len()
    }

    /// Nodes across all tables, tombstones included
    pub fn entry_count(&self) -> usize {
        let current = self.current.read();
        let frozen = self.frozen.read();
        current.node_count() + frozen.tables.iter().map(|t| t.node_count()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    pub fn status(&self) -> TableStatus {
        TableStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn lock_all(&self) -> FreezeGuard<'_> {
        self.lock_frozen(self.current.write())
    }

    fn lock_frozen<'a>(&'a self, current: RwLockWriteGuard<'a, Arc<SkipList>>) -> FreezeGuard<'a> {
        let frozen = self.frozen.write();
        FreezeGuard { current, frozen }
    }

    fn freeze_if_full(&self, current: RwLockWriteGuard<'_, Arc<SkipList>>) {
        if current.size() > self.config.memtable_size_limit {
            let mut guard = self.lock_frozen(current);
            self.freeze(&mut guard);
        }
    }

    /// Swap in a fresh current table (both locks held exclusively)
    fn freeze(&self, guard: &mut FreezeGuard<'_>) {
        self.status
            .store(TableStatus::Freezing as u8, Ordering::Release);

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let fresh = Arc::new(Self::make_table(&self.config, generation));
        let retired = std::mem::replace(&mut *guard.current, fresh);

        let bytes = retired.size();
        let nodes = retired.node_count();
        guard.frozen.bytes += bytes;
        guard.frozen.tables.push_front(retired);

        self.status.store(TableStatus::Frozen as u8, Ordering::Release);
        tracing::debug!(
            bytes,
            nodes,
            frozen_tables = guard.frozen.tables.len(),
            frozen_bytes = guard.frozen.bytes,
            "froze current table"
        );
    }

    fn mark_written(&self) {
        let _ = self.status.compare_exchange(
            TableStatus::Frozen as u8,
            TableStatus::Normal as u8,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }

    /// Copy candidate entries out of every table under shared locks
    ///
    /// Entries newer than a nonzero `horizon` are skipped. `tag` replaces
    /// stored versions when set.
    fn gather(&self, prefix: Option<&[u8]>, horizon: u64, tag: Option<u64>) -> Vec<SearchItem> {
        let current = self.current.read();
        let frozen = self.frozen.read();

        let mut items = Vec::new();
        let tables = std::iter::once(&*current).chain(frozen.tables.iter());
        for (level, table) in tables.enumerate() {
            let nodes: Box<dyn Iterator<Item = &Node> + '_> = match prefix {
                Some(prefix) => Box::new(table.prefix_nodes(prefix)),
                None => Box::new(table.iter()),
            };
            for (index, node) in nodes.enumerate() {
                if horizon != 0 && node.version() > horizon {
                    continue;
                }
                items.push(SearchItem::new(
                    node.key().to_vec(),
                    node.value().to_vec(),
                    tag.unwrap_or(node.version()),
                    level,
                    index,
                ));
            }
        }
        items
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Tombstones read as absent
fn live(value: &[u8]) -> Option<Vec<u8>> {
    (!value.is_empty()).then(|| value.to_vec())
}
