//! Error types for transcript extraction and entry reconciliation.
//!
//! Completion parsing has no error type: malformed model output always
//! degrades to raw text.

use thiserror::Error;

use crate::EntryId;

/// Failures raised by the pure lorebook operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoreError {
    /// Range selector with `start` after `end`.
    #[error("invalid message range: start {start} is after end {end}")]
    InvalidRange {
        /// Requested first index.
        start: usize,
        /// Requested last index (inclusive).
        end: usize,
    },

    /// Target entry is not present in the knowledge base.
    #[error("lorebook entry not found: {0}")]
    EntryNotFound(EntryId),

    /// Append/replace requested without naming a target entry.
    #[error("append or replace requires a target entry")]
    MissingTarget,
}
