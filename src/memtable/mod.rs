//! MemTable Module
//!
//! In-memory write buffer for recent writes.
//!
//! ## Responsibilities
//! - Fast versioned reads and writes in memory
//! - Freeze the current table once it outgrows its byte threshold
//! - Keep frozen tables readable, newest first
//! - Merged, deduplicated iteration across all tables
//!
//! ## Data Structure Choice
//! Each table is a skip list (`SkipList`). One table is current and takes
//! writes; frozen tables are `Arc`-shared and never mutated again.

mod merge;
mod skiplist;
mod table;

pub use merge::{MergeIterator, SearchItem};
pub use skiplist::{Iter, Node, SkipList, SkipListIterator};
pub use table::MemTable;

/// Lifecycle marker for the current table
///
/// Observability only; the locks are what make freezing safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TableStatus {
    /// Accepting writes
    Normal = 0,
    /// Swap of the current table in progress
    Freezing = 1,
    /// A freeze completed and nothing has been written since
    Frozen = 2,
}

impl TableStatus {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => TableStatus::Freezing,
            2 => TableStatus::Frozen,
            _ => TableStatus::Normal,
        }
    }
}
