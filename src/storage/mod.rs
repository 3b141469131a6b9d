//! Storage Module
//!
//! On-disk building blocks: sorted data blocks, the block index and the
//! file abstraction they are read through.
//!
//! ## Responsibilities
//! - Pack sorted entries into size-bounded blocks
//! - Binary search and prefix ranges inside a decoded block
//! - Index blocks by first/last key and file offset
//! - Detect corruption through CRC32 trailers
//!
//! ## Block Format
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ Data                                                │
//! │ ┌────────┬─────┬────────┬───────┬────────────────┐  │
//! │ │KeyLen 2│ Key │ValLen 2│ Value │ Version (8)    │  │
//! │ └────────┴─────┴────────┴───────┴────────────────┘  │
//! │ ... (repeated for each entry)                       │
//! ├─────────────────────────────────────────────────────┤
//! │ Offsets: u16 per entry                              │
//! ├─────────────────────────────────────────────────────┤
//! │ Count (2)                                           │
//! ├─────────────────────────────────────────────────────┤
//! │ CRC32 (4), optional, over everything above          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Index Format
//! ```text
//! ┌──────────┬──────────────────────────────────────────┬─────────┐
//! │ Count (8)│ Offset(8) FirstLen(2) First LastLen(2)   │ CRC32(4)│
//! │          │ Last  ... (repeated per block)           │         │
//! └──────────┴──────────────────────────────────────────┴─────────┘
//! ```
//! The index checksum covers the entries only, not the count.
//!
//! All integers are little-endian.

mod block;
mod file;
mod meta;

pub use block::{Block, BlockIterator};
pub use file::{read_block, FileObject, MemFile};
pub use meta::BlockMeta;
