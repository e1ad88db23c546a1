use serde::{Deserialize, Serialize};

use crate::{EntryId, EntryKind};

/// How a parsed summary is written into a knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum ReconcilePolicy {
    /// New keyword-triggered entry.
    CreateNew {
        /// Tag persisted on the created entry.
        kind: EntryKind,
    },
    /// New always-active entry without keywords.
    CreateAlwaysActive {
        /// Tag persisted on the created entry.
        kind: EntryKind,
    },
    /// Append the body to the target entry behind a visible separator.
    AppendToExisting,
    /// Replace the target entry body; keywords are kept.
    ReplaceExisting,
}

/// What a reconcile call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    /// A new entry was inserted.
    Created,
    /// The target body was extended.
    Appended,
    /// The target body was overwritten.
    Replaced,
}

/// Result of a successful reconcile call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Entry that was created or changed.
    pub entry_id: EntryId,
    /// Change applied.
    pub action: ReconcileAction,
}
