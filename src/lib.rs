//! # StrataKV
//!
//! Storage core of an embedded LSM key-value engine:
//! - Versioned skip list tables with freeze-on-threshold
//! - Merged, deduplicated iteration across in-memory tables
//! - Size-bounded sorted blocks with optional CRC32 trailers
//! - A checksummed block index and pluggable file access
//!
//! ## Architecture Overview
//!
//! ```text
//!            put / remove / get / prefix_search
//!                          │
//! ┌────────────────────────▼────────────────────────────────────┐
//! │                        MemTable                             │
//! │   ┌──────────────┐   freeze   ┌──────────────────────────┐  │
//! │   │   current    │ ─────────► │ frozen (newest first)    │  │
//! │   │  (RwLock)    │            │ (RwLock)                 │  │
//! │   └──────┬───────┘            └────────────┬─────────────┘  │
//! │          └──────────────┬──────────────────┘                │
//! │                         ▼                                   │
//! │                  MergeIterator                              │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ flush (evicted tables)
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Storage                              │
//! │   Block ──► encode / decode ──► FileObject ◄── BlockMeta     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod iterator;
pub mod memtable;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use error::{Result, StrataError};
pub use iterator::{EntryIterator, KvIterator, KvPair};
pub use memtable::{MemTable, MergeIterator, SkipList, SkipListIterator, TableStatus};
pub use storage::{Block, BlockIterator, BlockMeta, FileObject, MemFile};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StrataKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
