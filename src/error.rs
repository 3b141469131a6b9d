//! Error types for StrataKV
//!
//! Provides a unified error type for all operations.
//!
//! Capacity refusals (a full block) are not errors: `Block::add_entry`
//! reports them as `false` and the caller starts a new block.

use thiserror::Error;

/// Result type alias using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Unified error type for StrataKV operations
#[derive(Debug, Error)]
pub enum StrataError {
    // -------------------------------------------------------------------------
    // Decode Errors
    // -------------------------------------------------------------------------
    /// Checksum mismatch or a truncated/undersized buffer
    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Access Errors
    // -------------------------------------------------------------------------
    /// Index, offset or position beyond the valid range
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Operation on an absent backing structure
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
