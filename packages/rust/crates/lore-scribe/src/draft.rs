//! Reviewable drafts and commit targets.

use lore_timeline::{
    ContextSelector, EntryId, ParsedSummary, PromptMode, ReconcileOutcome, ReconcilePolicy,
    split_keywords,
};
use serde::{Deserialize, Serialize};

/// What to summarize and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRequest {
    /// Prompt template.
    pub mode: PromptMode,
    /// Chat slice; `None` reads the last `scan_depth` turns.
    #[serde(default)]
    pub selector: Option<ContextSelector>,
    /// Current note body for entity-note updates.
    #[serde(default)]
    pub existing_note: Option<String>,
}

impl DraftRequest {
    /// Request for `mode` over the default recent-turn window.
    #[must_use]
    pub fn new(mode: PromptMode) -> Self {
        Self {
            mode,
            selector: None,
            existing_note: None,
        }
    }

    /// Builder: explicit chat slice.
    #[must_use]
    pub fn with_selector(mut self, selector: ContextSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Builder: note being updated.
    #[must_use]
    pub fn with_existing_note(mut self, note: impl Into<String>) -> Self {
        self.existing_note = Some(note.into());
        self
    }
}

/// Generated summary awaiting user review.
///
/// `title`, `body` and `keywords` are edited in place before
/// [`crate::Scribe::commit`]; dropping the draft cancels the write. A
/// rejected commit leaves the draft with the caller for another try.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Template the completion was produced with.
    pub mode: PromptMode,
    /// History index of the first summarized turn.
    pub start_index: usize,
    /// History index of the last summarized turn.
    pub end_index: usize,
    /// Number of summarized turns.
    pub turn_count: usize,
    /// Proposed title.
    pub title: Option<String>,
    /// Proposed entry body.
    pub body: String,
    /// Proposed trigger keywords.
    pub keywords: Vec<String>,
}

impl Draft {
    /// Keywords as one comma-separated line for a plain-text editor.
    #[must_use]
    pub fn keywords_text(&self) -> String {
        self.keywords.join(", ")
    }

    /// Replace keywords from an edited comma-separated line.
    pub fn set_keywords_text(&mut self, text: &str) {
        self.keywords = split_keywords(text);
    }

    pub(crate) fn to_summary(&self) -> ParsedSummary {
        ParsedSummary {
            title: self.title.clone(),
            body: self.body.clone(),
            keywords: self.keywords.clone(),
        }
    }
}

/// How a regenerated entry body is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    /// Add the new text after the current body.
    Append,
    /// Swap the current body for the new text.
    Replace,
}

impl UpdateStrategy {
    pub(crate) fn policy(self) -> ReconcilePolicy {
        match self {
            Self::Append => ReconcilePolicy::AppendToExisting,
            Self::Replace => ReconcilePolicy::ReplaceExisting,
        }
    }
}

/// Regenerate one existing entry from recent chat.
///
/// The prompt template comes from the entry's persisted kind unless
/// `mode` overrides it; host-authored entries need an explicit mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryUpdate {
    /// Lorebook holding the entry.
    pub lorebook: String,
    /// Entry to regenerate.
    pub entry: EntryId,
    /// Append or replace.
    pub strategy: UpdateStrategy,
    /// Chat slice; `None` reads the last `scan_depth` turns.
    #[serde(default)]
    pub selector: Option<ContextSelector>,
    /// Template override.
    #[serde(default)]
    pub mode: Option<PromptMode>,
}

impl EntryUpdate {
    /// Update `entry` in `lorebook` using its stored kind.
    #[must_use]
    pub fn new(lorebook: impl Into<String>, entry: EntryId, strategy: UpdateStrategy) -> Self {
        Self {
            lorebook: lorebook.into(),
            entry,
            strategy,
            selector: None,
            mode: None,
        }
    }

    /// Builder: explicit chat slice.
    #[must_use]
    pub fn with_selector(mut self, selector: ContextSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Builder: template override.
    #[must_use]
    pub fn with_mode(mut self, mode: PromptMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Where and how a draft is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTarget {
    /// Lorebook name.
    pub lorebook: String,
    /// Entry changed by append/replace.
    #[serde(default)]
    pub entry: Option<EntryId>,
    /// Write policy.
    pub policy: ReconcilePolicy,
}

impl CommitTarget {
    /// Write a new entry into `lorebook`.
    #[must_use]
    pub fn create(lorebook: impl Into<String>, policy: ReconcilePolicy) -> Self {
        Self {
            lorebook: lorebook.into(),
            entry: None,
            policy,
        }
    }

    /// Change `entry` in `lorebook`.
    #[must_use]
    pub fn existing(lorebook: impl Into<String>, entry: EntryId, policy: ReconcilePolicy) -> Self {
        Self {
            lorebook: lorebook.into(),
            entry: Some(entry),
            policy,
        }
    }
}

/// Result of a committed draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Lorebook written.
    pub lorebook: String,
    /// Entry created or changed.
    pub outcome: ReconcileOutcome,
}

/// Result of writing a new event lorebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBookReceipt {
    /// Lorebook created.
    pub lorebook: String,
    /// Created entries in event order.
    pub entry_ids: Vec<EntryId>,
}
